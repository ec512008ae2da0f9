//! Bank alias table
//!
//! Surface forms are compacted (lowercase, no spaces/hyphens/dots) before
//! lookup, so "gt bank", "gt-bank" and "GTBank" share one entry. Single words
//! that are also ordinary English ("first", "union", "standard") only appear
//! together with their "bank"/brand suffix.

use lazy_static::lazy_static;
use std::collections::HashMap;

/// Raw alias → bank code
const BANK_ALIASES: &[(&str, &str)] = &[
    // GTBank
    ("gtbank", "058"), ("gtb", "058"), ("gtco", "058"), ("guaranty trust", "058"),
    ("guarantee trust", "058"), ("guaranty", "058"), ("gaurantee trust", "058"),
    // Access
    ("access", "044"), ("acess", "044"), ("access diamond", "044"), ("diamond", "044"),
    // First Bank
    ("first bank", "011"), ("firstbank", "011"), ("fbn", "011"), ("first bank of nigeria", "011"),
    // Zenith
    ("zenith", "057"), ("zenit", "057"), ("zenth", "057"),
    // UBA
    ("uba", "033"), ("united bank for africa", "033"), ("united bank", "033"),
    // Fidelity
    ("fidelity", "070"), ("fidelty", "070"),
    // Sterling
    ("sterling", "232"), ("sterlin", "232"),
    // Union
    ("union bank", "032"), ("union bank of nigeria", "032"),
    // Wema
    ("wema", "035"), ("alat", "035"),
    // FCMB
    ("fcmb", "214"), ("first city monument", "214"), ("first city monument bank", "214"),
    // Ecobank
    ("ecobank", "050"), ("eco bank", "050"),
    // Keystone
    ("keystone", "082"),
    // Stanbic
    ("stanbic", "221"), ("stanbic ibtc", "221"), ("ibtc", "221"),
    // Heritage
    ("heritage", "030"),
    // Unity
    ("unity bank", "215"),
    // Providus
    ("providus", "101"),
    // Suntrust
    ("suntrust", "100"),
    // Polaris
    ("polaris", "076"), ("skye", "076"),
    // Kuda
    ("kuda", "50211"), ("kooda", "50211"), ("kuda microfinance", "50211"),
    // OPay
    ("opay", "999992"), ("o pay", "999992"), ("o-pay", "999992"), ("opera pay", "999992"),
    // Moniepoint
    ("moniepoint", "50515"), ("monie point", "50515"), ("money point", "50515"),
    ("moneypoint", "50515"), ("moniepont", "50515"),
    // PalmPay
    ("palmpay", "999991"), ("palm pay", "999991"), ("palm-pay", "999991"),
    // Carbon
    ("carbon", "565"),
    // Rubies
    ("rubies", "125"),
    // VFD
    ("vfd", "566"),
    // Mint
    ("mint", "50304"),
    // Globus
    ("globus", "103"),
    // Parallex
    ("parallex", "104"),
    // Coronation
    ("coronation", "559"),
    // Citi
    ("citi", "023"), ("citibank", "023"),
    // Standard Chartered
    ("standard chartered", "068"), ("scb", "068"),
];

/// Bank code → display name
const BANK_NAMES: &[(&str, &str)] = &[
    ("044", "Access Bank"),
    ("058", "GTBank"),
    ("011", "First Bank"),
    ("057", "Zenith Bank"),
    ("033", "UBA"),
    ("070", "Fidelity Bank"),
    ("232", "Sterling Bank"),
    ("032", "Union Bank"),
    ("035", "Wema Bank"),
    ("214", "FCMB"),
    ("050", "Ecobank"),
    ("082", "Keystone Bank"),
    ("221", "Stanbic IBTC"),
    ("030", "Heritage Bank"),
    ("215", "Unity Bank"),
    ("101", "Providus Bank"),
    ("100", "Suntrust Bank"),
    ("076", "Polaris Bank"),
    ("50211", "Kuda Bank"),
    ("999992", "OPay"),
    ("50515", "Moniepoint"),
    ("999991", "PalmPay"),
    ("565", "Carbon"),
    ("125", "Rubies Bank"),
    ("566", "VFD Bank"),
    ("50304", "Mint Bank"),
    ("103", "Globus Bank"),
    ("104", "Parallex Bank"),
    ("559", "Coronation Bank"),
    ("023", "Citibank"),
    ("068", "Standard Chartered"),
];

/// Suffixes that may trail an alias without changing the bank
const OPTIONAL_SUFFIXES: &[&str] = &["microfinancebank", "mfb", "plc", "bank", "nigeria", "ng"];

lazy_static! {
    static ref ALIAS_INDEX: HashMap<String, &'static str> = BANK_ALIASES
        .iter()
        .map(|(alias, code)| (compact(alias), *code))
        .collect();
    static ref NAME_INDEX: HashMap<&'static str, &'static str> =
        BANK_NAMES.iter().copied().collect();
}

/// Lowercase and drop spaces, hyphens, dots and apostrophes.
pub fn compact(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '.' | '\'' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Resolve any surface form to a bank code.
pub fn resolve_bank_code(alias: &str) -> Option<&'static str> {
    let mut key = compact(alias);
    if key.is_empty() {
        return None;
    }

    loop {
        if let Some(code) = ALIAS_INDEX.get(&key) {
            return Some(code);
        }
        let stripped = OPTIONAL_SUFFIXES
            .iter()
            .find_map(|suffix| key.strip_suffix(suffix).filter(|rest| !rest.is_empty()));
        match stripped {
            Some(rest) => key = rest.to_string(),
            None => return None,
        }
    }
}

pub fn bank_name(code: &str) -> Option<&'static str> {
    NAME_INDEX.get(code).copied()
}

pub fn is_known_code(code: &str) -> bool {
    NAME_INDEX.contains_key(code)
}

/// (code, display name) for every bank in the table
pub fn known_banks() -> impl Iterator<Item = (&'static str, &'static str)> {
    BANK_NAMES.iter().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spacing_and_hyphen_variants() {
        for alias in ["gtbank", "GT Bank", "gt-bank", "GTB", "guaranty trust bank"] {
            assert_eq!(resolve_bank_code(alias), Some("058"), "alias {}", alias);
        }
        assert_eq!(resolve_bank_code("palm-pay"), Some("999991"));
        assert_eq!(resolve_bank_code("O Pay"), Some("999992"));
    }

    #[test]
    fn test_suffix_stripping() {
        assert_eq!(resolve_bank_code("access bank"), Some("044"));
        assert_eq!(resolve_bank_code("Access Bank Plc"), Some("044"));
        assert_eq!(resolve_bank_code("moniepoint mfb"), Some("50515"));
    }

    #[test]
    fn test_misspellings() {
        assert_eq!(resolve_bank_code("kooda"), Some("50211"));
        assert_eq!(resolve_bank_code("money point"), Some("50515"));
        assert_eq!(resolve_bank_code("zenit"), Some("057"));
    }

    #[test]
    fn test_common_words_need_bank_suffix() {
        assert_eq!(resolve_bank_code("first"), None);
        assert_eq!(resolve_bank_code("union"), None);
        assert_eq!(resolve_bank_code("first bank"), Some("011"));
        assert_eq!(resolve_bank_code("union bank"), Some("032"));
    }

    #[test]
    fn test_unknown_alias() {
        assert_eq!(resolve_bank_code("lotus bank"), None);
        assert_eq!(resolve_bank_code(""), None);
        assert_eq!(resolve_bank_code("bank"), None);
    }

    #[test]
    fn test_every_alias_has_a_display_name() {
        for (_, code) in BANK_ALIASES {
            assert!(bank_name(code).is_some(), "missing display name for {}", code);
        }
    }
}
