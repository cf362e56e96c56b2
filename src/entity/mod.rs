pub mod store_entries;
