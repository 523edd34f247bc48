mod assembly;
mod cli;
mod ingest;
