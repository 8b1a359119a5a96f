use crate::app::Query;
use crate::card;

pub async fn serve(q: Query) -> anyhow::Result<()> {
    q.page().add(
        "hello",
        card! {
            "view" => "markdown",
            "box" => "1 1 2 2",
            "title" => "Hello World!",
            "content" => "And now for something completely different!",
        },
    )?;
    q.page().save().await?;
    Ok(())
}
