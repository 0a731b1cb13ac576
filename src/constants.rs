/// Constants used by the identifier grammar registry.
pub mod grammar {
    /// Accession label prefix shared by the labeled repository rules.
    ///
    /// `{label}` is replaced with the repository label and `{accession}` with the
    /// rule-specific accession grammar.
    pub const LABELED_RULE_TEMPLATE: &str =
        r"{label}\s+(?:Accession\s+)?(?:No\.?|Number)?\s*[:]?\s*({accession})";
    /// Fallback template applied to repositories without bespoke rules.
    pub const GENERIC_RULE_TEMPLATE: &str =
        r"\b({code})\b[\s:]+(?:Accession\s+)?(?:No\.?|Number)?\s*([0-9][0-9\.\-]*)";
    /// Repositories covered only by the generic template, in registry order.
    pub const STANDARD_REPOSITORY_CODES: &[&str] = &[
        "CGMCC", "GDMCC", "KCCM", "KCLRF", "KACC", "CNCM", "Westerdijk", "BCCM", "LMG", "IHEM",
        "MUCL", "IDAC", "NML", "MCC", "NAIMCC", "VKM", "VKPM", "CECT", "BEA", "DBVPG", "IZSLER",
        "CBA", "NMI", "PCM", "IAFB", "KPD", "NCIMB", "NCTC", "NCYC", "CCAP", "IMI", "NIBSC",
        "NCMA", "IVS", "CChRGM", "CCM", "VTTCC", "NCAIM", "MSCL", "CCMM", "CM-CNRG", "MUM",
        "UCCCB", "CCY", "CCOS", "NBIMCC",
    ];
    /// Minimum accepted identifier length (exclusive).
    pub const MIN_IDENTIFIER_LEN: usize = 2;
}

/// Constants used by the deposit query builder.
pub mod query {
    /// Legal statuses treated as "no longer enforceable".
    pub const EXPIRED_STATUSES: &[&str] = &["EXPIRED", "LAPSED", "REVOKED", "CEASED"];
    /// IPC class wildcards covering biological subject matter.
    pub const BIO_IPC_PATTERNS: &[&str] =
        &["C12*", "C07K*", "A61K*", "A01H*", "C12Q*", "C07H*", "A23L*"];
    /// Phrases that signal a biological deposit in the full text.
    pub const DEPOSIT_PHRASES: &[&str] = &[
        "Budapest Treaty",
        "International Depository Authority",
        "biological deposit",
        "culture collection",
    ];
    /// Fields requested for scan pages.
    pub const SCAN_FIELDS: &[&str] = &["lens_id", "biblio", "claims", "description", "legal_status"];
    /// Fields requested for id lookups.
    pub const LOOKUP_FIELDS: &[&str] = &["lens_id", "description", "claims"];
    /// Title used when the search service omits one.
    pub const MISSING_TITLE: &str = "No Title";
    /// Document identifier field.
    pub const ID_FIELD: &str = "lens_id";
    /// Legal status field filtered by `EXPIRED_STATUSES`.
    pub const LEGAL_STATUS_FIELD: &str = "legal_status.patent_status";
    /// IPC symbol field matched by `BIO_IPC_PATTERNS`.
    pub const IPC_FIELD: &str = "class_ipc.symbol";
    /// Full-text field searched for deposit phrases.
    pub const FULL_TEXT_FIELD: &str = "full_text";
}

/// Constants used by the Lens search client.
pub mod lens {
    /// Default search endpoint.
    pub const DEFAULT_ENDPOINT: &str = "https://api.lens.org/patent/search";
    /// Environment variable overriding the endpoint.
    pub const ENDPOINT_ENV: &str = "BIOBROKER_LENS_ENDPOINT";
    /// Environment variable carrying the API key.
    pub const API_KEY_ENV: &str = "LENS_API_KEY";
    /// Source id used in errors and logs.
    pub const SOURCE_ID: &str = "lens";
    /// Default scroll context lifetime.
    pub const DEFAULT_SCROLL_TTL: &str = "2m";
    /// HTTP statuses retried with backoff.
    pub const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504];
    /// Largest response body read from the search API. Full-text scan pages
    /// routinely exceed the HTTP client's 10 MiB default.
    pub const DEFAULT_MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;
}

/// Constants used by the claim-membership classifier and status labels.
pub mod claims {
    /// Status label for identifiers found in the claims.
    pub const STATUS_OPEN_SOURCE: &str = "OPEN SOURCE";
    /// Status label for identifiers found only in the description.
    pub const STATUS_MENTIONED: &str = "Mentioned";
    /// Keys inspected when flattening nested claim payloads.
    pub const CLAIM_TEXT_KEYS: &[&str] = &["claim_text", "text", "claim"];
    /// Key holding nested claim lists.
    pub const NESTED_CLAIMS_KEY: &str = "claims";
}

/// Constants used by the structured-answer reconciler.
pub mod reconcile {
    /// Sentinel for fields the generator did not supply.
    pub const UNKNOWN: &str = "Unknown";
    /// Name written when the answer could not be parsed.
    pub const PARSE_ERROR: &str = "Parse Error";
    /// Placeholder for non-name fields on the failure path.
    pub const SEE_RAW: &str = "See Raw";
    /// Category assigned to names equal to "human".
    pub const CATEGORY_HUMAN_CELL_LINE: &str = "Human Cell Line";
    /// Category assigned to hybridoma names.
    pub const CATEGORY_HYBRIDOMA: &str = "Hybridoma";
    /// Category assigned to plasmid and vector names.
    pub const CATEGORY_PLASMID_VECTOR: &str = "Plasmid/Vector";
    /// Organism-class words that must never remain in the name field.
    pub const GENERIC_CLASS_NAMES: &[&str] = &[
        "bacteria",
        "fungi",
        "yeast",
        "virus",
        "mammalian cell line",
        "cell line",
    ];
    /// Category values that may be replaced by a migrated organism class.
    pub const REPLACEABLE_CATEGORIES: &[&str] = &["Unknown", "Error", "Other"];
    /// Minimum raw text length worth a rescue attempt.
    pub const MIN_RESCUE_CHARS: usize = 10;
}

/// Constants used by the enrichment stage.
pub mod enrichment {
    /// Default generation model.
    pub const DEFAULT_MODEL: &str = "llama3";
    /// Default generation endpoint.
    pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:11434";
    /// Environment variable overriding the generation endpoint.
    pub const ENDPOINT_ENV: &str = "BIOBROKER_OLLAMA_ENDPOINT";
    /// Prompt prefix used for the self-repair attempt.
    pub const REPAIR_PROMPT_PREFIX: &str = "Extract the JSON object from this text:\n";
    /// Prompt used to check that the generator answers at all.
    pub const READINESS_PROMPT: &str = "Hi";
    /// How long the generation service keeps the model loaded.
    pub const KEEP_ALIVE: &str = "3h";
}

/// Constants used by the catalog and search surface.
pub mod catalog {
    /// Default embedding model.
    pub const DEFAULT_EMBED_MODEL: &str = "all-minilm";
    /// Maximum characters sent per embedding input.
    pub const EMBED_MAX_CHARS: usize = 8_000;
    /// Default catalog file name.
    pub const DEFAULT_CATALOG_FILE: &str = "bio_catalog.json";
    /// Version tag written into persisted catalogs.
    pub const CATALOG_VERSION: u8 = 1;
    /// Order-link prefix for ATCC accessions.
    pub const ATCC_ORDER_PREFIX: &str = "https://www.atcc.org/products/";
    /// Order-link prefix for DSMZ accessions.
    pub const DSMZ_ORDER_PREFIX: &str = "https://www.dsmz.de/collection/catalogue/details/culture/DSM-";
}
