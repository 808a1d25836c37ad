pub mod flat;

pub use flat::{cosine_similarity, FlatIndex, INDEX_FILE_NAME};
