//! `fittrack status` and `fittrack trainers`

use super::Session;
use anyhow::Result;

pub async fn status(session: &Session, id: Option<String>) -> Result<()> {
    let id = session.trainer_id(id)?;
    let trainer = session.client.trainer(&id).await?;
    session.format.print(&trainer)
}

pub async fn list(session: &Session) -> Result<()> {
    let trainers = session.client.trainers().await?;
    session.format.print(&trainers)
}
