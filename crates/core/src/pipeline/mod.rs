pub mod segment_aggregator;
pub mod transcribe_use_case;
