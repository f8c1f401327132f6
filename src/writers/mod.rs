//! Writer implementations

pub mod async_writer;
pub mod db;
pub mod http_metric;
pub mod mock;
pub mod prometheus;
pub mod slack;
pub mod stream;
pub mod udp;

pub use async_writer::{AsyncWriter, AsyncWriterBuilder};
pub use db::{ColumnMap, DbWriter, MemoryTableSink, Row, SqliteTableSink, TableSink};
pub use http_metric::HttpMetricWriter;
pub use mock::MockWriter;
pub use self::prometheus::{sanitize_namespace, MetricKind, PrometheusOptions, PrometheusWriter};
pub use slack::SlackWriter;
pub use stream::StreamWriter;
pub use udp::UdpWriter;

pub use crate::core::{Writer, WriterState};
