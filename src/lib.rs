// Elsearm - typed records as Elasticsearch/OpenSearch documents
//
// This library derives index names, document ids and bodies from record
// types, and binds search results back into values, arrays and lists.

// Re-export core functionality
pub use elsearm_core::*;

// Re-export optional crates
#[cfg(any(feature = "opensearch", feature = "opensearch-native-tls"))]
pub use elsearm_opensearch;

#[cfg(feature = "testing")]
pub use elsearm_testing;
