pub mod invoice_sink;

pub use invoice_sink::{InvoiceSink, MemoryInvoiceSink};
