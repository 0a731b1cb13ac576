/// Patent document identifier issued by the search service.
/// Example: `001-234-567-890-123`
pub type DocumentId = String;
/// Short code of a culture collection or depository institution.
/// Examples: `ATCC`, `DSMZ`, `CM-CNRG`
pub type RepositoryCode = String;
/// Accession identifier as extracted (upper-cased, trailing periods trimmed).
/// Examples: `PTA-12345`, `DSM 1234`, `280.96`
pub type AccessionId = String;
/// Identifier for an external collaborator (search, generation, embedding).
/// Examples: `lens`, `memory`, `ollama`
pub type SourceId = String;
/// Resume key built from completed checkpoint rows.
/// Example: `("001-234-567-890-123", "PTA-12345")`
pub type ResumeKey = (DocumentId, AccessionId);
/// Extraction-stage key: the same identifier cited under two collections
/// yields two rows.
/// Example: `("001-234-567-890-123", "ATCC", "55555")`
pub type ExtractionKey = (DocumentId, RepositoryCode, AccessionId);
/// Dense embedding vector.
pub type Embedding = Vec<f32>;
