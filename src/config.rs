// Configuration for table classification and the PubChem PUG-REST lookup.
// Passed explicitly into ingestion and resolution so computations are
// reproducible and testable in isolation.

#[derive(Clone, Debug)]
pub struct Config {
    /// URL prefix of the fingerprint property lookup; the comma-joined
    /// CID list is inserted between prefix and suffix.
    pub service_url_start: String,
    pub service_url_end: String,
    /// JSON field carrying the base64 fingerprint in the service response.
    pub fingerprint_field: String,
    /// Header token marking a column of raw fingerprint bitstrings.
    pub fingerprint_token: String,
    /// Header token marking a column of PubChem CIDs.
    pub cid_token: String,
    /// Trailing pad bits to strip from a decoded fingerprint.
    pub pad_len: usize,
    /// Floor added to every activity value so logarithms are defined.
    pub epsilon: f64,
}

pub const DEFAULT_EPSILON: f64 = 1e-6;

impl Default for Config {
    fn default() -> Self {
        Self {
            service_url_start: "https://pubchem.ncbi.nlm.nih.gov/rest/pug/compound/cid/"
                .to_string(),
            service_url_end: "/property/Fingerprint2D/JSON".to_string(),
            fingerprint_field: "Fingerprint2D".to_string(),
            fingerprint_token: "fingerprint".to_string(),
            cid_token: "cid".to_string(),
            pad_len: 17,
            epsilon: DEFAULT_EPSILON,
        }
    }
}
