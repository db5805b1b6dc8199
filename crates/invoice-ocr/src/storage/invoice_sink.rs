use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::pipeline::InvoiceResult;

/// Persistence seam for finalized invoices.
#[async_trait]
pub trait InvoiceSink: Send + Sync {
    async fn persist(&self, invoice: &InvoiceResult) -> Result<(), StorageError>;

    async fn fetch(&self, job_id: &str) -> Result<Option<InvoiceResult>, StorageError>;
}

/// Keeps invoices in a process-local map.
#[derive(Default)]
pub struct MemoryInvoiceSink {
    invoices: RwLock<HashMap<String, InvoiceResult>>,
}

impl MemoryInvoiceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        match self.invoices.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl InvoiceSink for MemoryInvoiceSink {
    async fn persist(&self, invoice: &InvoiceResult) -> Result<(), StorageError> {
        let mut invoices = self.invoices.write().map_err(|_| StorageError::Persist {
            job_id: invoice.job_id.clone(),
            message: "invoice map lock poisoned".to_string(),
        })?;
        invoices.insert(invoice.job_id.clone(), invoice.clone());
        Ok(())
    }

    async fn fetch(&self, job_id: &str) -> Result<Option<InvoiceResult>, StorageError> {
        let invoices = self.invoices.read().map_err(|_| StorageError::Fetch {
            job_id: job_id.to_string(),
            message: "invoice map lock poisoned".to_string(),
        })?;
        Ok(invoices.get(job_id).cloned())
    }
}
