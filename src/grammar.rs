//! Identifier grammar registry.
//!
//! Each repository code maps to an ordered list of rules. Bespoke rules cover
//! the high-volume depositories and their historical prefix conventions; every
//! other code gets the generic template. Registry order is the declaration
//! order below and is stable across runs.

use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};

use crate::constants::grammar::{
    GENERIC_RULE_TEMPLATE, LABELED_RULE_TEMPLATE, STANDARD_REPOSITORY_CODES,
};
use crate::errors::MinerError;
use crate::types::RepositoryCode;

/// Declarative rule shape, expanded into a regex at registry build time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleKind {
    /// `<label> [Accession] [No.|Number] [:] <accession>`.
    ///
    /// `label` may differ from the repository code (DSMZ deposits are cited
    /// as "DSM").
    Labeled {
        label: &'static str,
        accession: &'static str,
    },
    /// The accession grammar already embeds its own prefix (FERM BP-1234).
    Standalone { accession: &'static str },
    /// Generic fallback keyed on the repository code itself.
    Generic,
}

impl RuleKind {
    /// Regex source for this rule when registered under `code`.
    pub fn pattern(&self, code: &str) -> String {
        match self {
            RuleKind::Labeled { label, accession } => LABELED_RULE_TEMPLATE
                .replace("{label}", &regex::escape(label))
                .replace("{accession}", accession),
            RuleKind::Standalone { accession } => format!("({accession})"),
            RuleKind::Generic => GENERIC_RULE_TEMPLATE.replace("{code}", &regex::escape(code)),
        }
    }
}

/// A compiled, case-insensitive recognizer.
#[derive(Clone, Debug)]
pub struct GrammarRule {
    kind: RuleKind,
    regex: Regex,
}

impl GrammarRule {
    /// Compile `kind` for repository `code`.
    pub fn compile(code: &str, kind: RuleKind) -> Result<Self, MinerError> {
        let regex = RegexBuilder::new(&kind.pattern(code))
            .case_insensitive(true)
            .build()?;
        Ok(Self { kind, regex })
    }

    /// Rule shape this recognizer was built from.
    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// Raw identifier strings for every non-overlapping match in `text`.
    ///
    /// Uses the last participating capture group when the rule has groups,
    /// otherwise the whole match.
    pub fn raw_matches<'t>(&self, text: &'t str) -> impl Iterator<Item = &'t str> {
        self.regex.captures_iter(text).filter_map(|caps| {
            caps.iter()
                .skip(1)
                .flatten()
                .last()
                .or_else(|| caps.get(0))
                .map(|m| m.as_str())
        })
    }
}

const ATCC_LABEL: &str = "ATCC";
const CUSTOM_RULES: &[(&str, &[RuleKind])] = &[
    (
        "ATCC",
        &[
            RuleKind::Labeled {
                label: ATCC_LABEL,
                accession: r"PTA-[\d]+",
            },
            RuleKind::Labeled {
                label: ATCC_LABEL,
                accession: r"CRL-[\d]+",
            },
            RuleKind::Labeled {
                label: ATCC_LABEL,
                accession: r"HB-[\d]+",
            },
            RuleKind::Labeled {
                label: ATCC_LABEL,
                accession: r"CCL-[\d]+",
            },
            RuleKind::Labeled {
                label: ATCC_LABEL,
                accession: r"\d{4,}",
            },
        ],
    ),
    (
        "ECACC",
        &[
            RuleKind::Labeled {
                label: "ECACC",
                accession: r"\d{8}",
            },
            RuleKind::Labeled {
                label: "ECACC",
                accession: r"V\d+",
            },
        ],
    ),
    (
        "DSMZ",
        &[
            RuleKind::Labeled {
                label: "DSM",
                accession: r"DSM\s?\d+",
            },
            RuleKind::Labeled {
                label: "DSM",
                accession: r"\d{4,}",
            },
        ],
    ),
    (
        "NRRL",
        &[
            RuleKind::Labeled {
                label: "NRRL",
                accession: r"(?:B|Y|RL)[- ]?\d+",
            },
            RuleKind::Labeled {
                label: "NRRL",
                accession: r"\d{4,}",
            },
        ],
    ),
    (
        "IPOD",
        &[
            RuleKind::Standalone {
                accession: r"FERM\s+BP[- ]?\d+",
            },
            RuleKind::Standalone {
                accession: r"FERM\s+P[- ]?\d+",
            },
        ],
    ),
    (
        "CBS",
        &[RuleKind::Labeled {
            label: "CBS",
            accession: r"\d+(?:\.\d+)?",
        }],
    ),
    (
        "CCTCC",
        &[
            RuleKind::Labeled {
                label: "CCTCC",
                accession: r"(?:M|V)\s?2\d{5}",
            },
            RuleKind::Labeled {
                label: "CCTCC",
                accession: r"\d{4,}",
            },
        ],
    ),
    (
        "KCTC",
        &[RuleKind::Labeled {
            label: "KCTC",
            accession: r"\d{4,}",
        }],
    ),
    (
        "MTCC",
        &[RuleKind::Labeled {
            label: "MTCC",
            accession: r"\d{3,}",
        }],
    ),
];

/// Ordered map from repository code to compiled rules.
#[derive(Clone, Debug)]
pub struct GrammarRegistry {
    rules: IndexMap<RepositoryCode, Vec<GrammarRule>>,
}

impl GrammarRegistry {
    /// Build the registry with every bespoke and generic repository rule.
    pub fn builtin() -> Result<Self, MinerError> {
        let mut registry = Self::empty();
        for (code, kinds) in CUSTOM_RULES {
            for kind in kinds.iter() {
                registry.register(code, kind.clone())?;
            }
        }
        for code in STANDARD_REPOSITORY_CODES {
            registry.register(code, RuleKind::Generic)?;
        }
        Ok(registry)
    }

    /// Registry without rules.
    pub fn empty() -> Self {
        Self {
            rules: IndexMap::new(),
        }
    }

    /// Append a rule for `code`, creating the entry on first use.
    pub fn register(&mut self, code: &str, kind: RuleKind) -> Result<(), MinerError> {
        let rule = GrammarRule::compile(code, kind)?;
        self.rules.entry(code.to_string()).or_default().push(rule);
        Ok(())
    }

    /// Repository codes in registry order.
    pub fn repository_codes(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// `(code, rules)` pairs in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[GrammarRule])> {
        self.rules
            .iter()
            .map(|(code, rules)| (code.as_str(), rules.as_slice()))
    }

    /// Number of registered repositories.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no repository is registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(code: &str, kind: RuleKind, text: &str) -> Vec<String> {
        let rule = GrammarRule::compile(code, kind).unwrap();
        rule.raw_matches(text).map(str::to_string).collect()
    }

    #[test]
    fn builtin_registry_orders_custom_before_generic() {
        let registry = GrammarRegistry::builtin().unwrap();
        let codes: Vec<&str> = registry.repository_codes().collect();
        assert_eq!(&codes[..3], &["ATCC", "ECACC", "DSMZ"]);
        assert_eq!(codes.last(), Some(&"NBIMCC"));
        assert_eq!(registry.len(), CUSTOM_RULES.len() + STANDARD_REPOSITORY_CODES.len());
    }

    #[test]
    fn labeled_rule_accepts_optional_accession_wording() {
        let kind = RuleKind::Labeled {
            label: "ATCC",
            accession: r"PTA-[\d]+",
        };
        let text = "ATCC PTA-1, atcc Accession No. PTA-22 and ATCC Number: PTA-333";
        assert_eq!(matches("ATCC", kind, text), vec!["PTA-1", "PTA-22", "PTA-333"]);
    }

    #[test]
    fn standalone_rule_returns_whole_identifier() {
        let kind = RuleKind::Standalone {
            accession: r"FERM\s+BP[- ]?\d+",
        };
        assert_eq!(
            matches("IPOD", kind, "deposited as FERM BP-4321."),
            vec!["FERM BP-4321"]
        );
    }

    #[test]
    fn generic_rule_requires_word_boundary_before_code() {
        let text = "NCIMB 10592 and XNCIMB 777 and ncimb: No. 4.5-6";
        assert_eq!(
            matches("NCIMB", RuleKind::Generic, text),
            vec!["10592", "4.5-6"]
        );
    }

    #[test]
    fn generic_rule_escapes_codes_with_hyphens() {
        let text = "CM-CNRG 2201";
        assert_eq!(matches("CM-CNRG", RuleKind::Generic, text), vec!["2201"]);
    }

    #[test]
    fn dsmz_rule_uses_dsm_label() {
        let registry = GrammarRegistry::builtin().unwrap();
        let (_, rules) = registry.iter().find(|(code, _)| *code == "DSMZ").unwrap();
        let found: Vec<&str> = rules
            .iter()
            .flat_map(|rule| rule.raw_matches("DSM No. DSM 1234"))
            .collect();
        assert!(found.contains(&"DSM 1234"));
    }
}
