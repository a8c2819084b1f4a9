// Ingestion pipeline: validation gate → pending selection → batch transfer.
// The transfer service is external; everything it needs goes through `TransferClient`.

pub mod handlers;
pub mod orchestrator;
pub mod transfer;
pub mod validation;
