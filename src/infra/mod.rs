pub mod parquet_sink;

pub use parquet_sink::ParquetSink;
