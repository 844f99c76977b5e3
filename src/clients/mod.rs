mod couchdb;
mod handlers;
mod model;
mod store;

pub use couchdb::CouchDbClientStore;
pub use handlers::{
    ClientsState, create_client_handler, delete_client_handler, fetch_client_handler,
    update_client_handler,
};
pub use model::{Client, ClientRecord, Supplemental, ValidationError, scopes};
pub use store::{ClientStore, MemoryClientStore, SharedClientStore};
