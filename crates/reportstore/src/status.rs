use serde::Serialize;

use crate::store::{Result, SpreadsheetStore, StoreDescription};

#[derive(Clone, Debug, Serialize)]
pub struct Health {
    pub ok: bool,
    pub exists: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct Status {
    pub ok: bool,
    #[serde(flatten)]
    pub store: StoreDescription,
}

// Neither probe goes through the write queue.

pub async fn health(store: &dyn SpreadsheetStore) -> Result<Health> {
    let desc = store.describe().await?;
    Ok(Health {
        ok: true,
        exists: desc.exists,
    })
}

pub async fn status(store: &dyn SpreadsheetStore) -> Result<Status> {
    Ok(Status {
        ok: true,
        store: store.describe().await?,
    })
}
