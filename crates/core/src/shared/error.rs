/// Error type used at engine seams, where adapters surface whatever their
/// underlying library reports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
