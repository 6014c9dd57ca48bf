pub mod batch_analysis; // Batched streaming analysis, retry, aggregation
pub mod content; // Filtering and near-duplicate removal
pub mod diagnostic; // Raw-output dump (auto in dev, RISKLENS_DUMP_DIR in prod)
pub mod stream_decoder; // SSE chat-completion decoding
pub mod structuring; // JSON extraction, repair, normalization
