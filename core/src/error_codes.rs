//! Stable error codes surfaced alongside error messages.
//!
//! Codes never change meaning once published; new failure modes get new codes.

pub const CONTAINER_IO: &str = "PBIL_CONT_001";
pub const CONTAINER_ZIP: &str = "PBIL_CONT_002";
pub const CONTAINER_NOT_ZIP: &str = "PBIL_CONT_003";
pub const CONTAINER_TOO_MANY_ENTRIES: &str = "PBIL_CONT_004";
pub const CONTAINER_PART_TOO_LARGE: &str = "PBIL_CONT_005";
pub const CONTAINER_TOTAL_TOO_LARGE: &str = "PBIL_CONT_006";
pub const CONTAINER_MISSING_SCHEMA: &str = "PBIL_CONT_007";

pub const DECODE_JSON: &str = "PBIL_DEC_001";
pub const DECODE_EMPTY: &str = "PBIL_DEC_002";

pub const DATA_MODEL_BAD_MAGIC: &str = "PBIL_DM_001";
pub const DATA_MODEL_UNSUPPORTED_VERSION: &str = "PBIL_DM_002";
pub const DATA_MODEL_FRAMING: &str = "PBIL_DM_003";
pub const DATA_MODEL_COMPRESSION: &str = "PBIL_DM_004";
pub const DATA_MODEL_VALUE: &str = "PBIL_DM_005";
pub const DATA_MODEL_SEGMENT_TOO_LARGE: &str = "PBIL_DM_006";

pub const SAMPLE_DATA_UNAVAILABLE: &str = "PBIL_DATA_001";
pub const SAMPLE_UNKNOWN_TABLE: &str = "PBIL_DATA_002";
pub const SAMPLE_DECODE: &str = "PBIL_DATA_003";
pub const SAMPLE_WORKER: &str = "PBIL_DATA_004";

pub const SESSION_MISSING_CREDENTIAL: &str = "PBIL_CHAT_001";
pub const BACKEND_TRANSPORT: &str = "PBIL_CHAT_002";
pub const BACKEND_STATUS: &str = "PBIL_CHAT_003";
pub const BACKEND_MALFORMED: &str = "PBIL_CHAT_004";
pub const BACKEND_UNCONFIGURED: &str = "PBIL_CHAT_005";

pub const CONFIG_INVALID: &str = "PBIL_CFG_001";
