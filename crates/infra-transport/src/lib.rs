// netbill Infrastructure - Message Transport Adapter
// Implements: MessageTransport, MessageTransportFactory

pub mod http_transport;

pub use http_transport::{HttpMessageTransport, HttpTransportFactory, DEFAULT_TIMEOUT};
