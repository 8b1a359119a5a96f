//! A card whose title counts up once per second in the background.

use std::time::Duration;

use crate::app::Query;
use crate::card;

const TICKS: u32 = 100;
const TICK: Duration = Duration::from_secs(1);

pub async fn serve(q: Query) -> anyhow::Result<()> {
    q.page().add(
        "counter",
        card! {
            "view" => "markdown",
            "box" => "1 1 2 2",
            "title" => "Counter: 0",
            "content" => "The counter has not started!",
        },
    )?;
    q.page().save().await?;

    let page = q.page_handle();
    q.run_cancellable(move |stop| async move {
        for n in 1..=TICKS {
            {
                let card = page.get("counter")?;
                card.set("title", format!("Counter: {n}"))?;
                card.set("content", "The count increases automatically!")?;
            }
            page.save().await?;

            tokio::select! {
                () = stop.cancelled() => break,
                () = tokio::time::sleep(TICK) => {}
            }
        }
        Ok(())
    })
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::config::AppConfig;
    use crate::session::Session;
    use crate::wire::Payload;

    #[tokio::test]
    async fn test_counter_ticks_in_background() {
        let session = Arc::new(Session::new("CS2345678923456789", Arc::new(AppConfig::default())));
        let page = session.page("/counter");
        page.start_sync().await.unwrap();

        serve(Query::new("/counter", Payload::default(), Arc::clone(&session)))
            .await
            .unwrap();

        let first = page.changes().await.unwrap().to_json();
        assert_eq!(first["d"][0]["d"]["title"], json!("Counter: 0"));

        let tick = page.changes().await.unwrap().to_json();
        assert_eq!(tick["d"][0], json!({"k": "counter title", "v": "Counter: 1"}));
        assert_eq!(session.tasks().running(), 1);

        session.tasks().join(Duration::ZERO).await;
        assert!(session.tasks().is_empty());
        assert_eq!(session.tasks().stats().cancelled, 1);
    }
}
