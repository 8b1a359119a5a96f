//! Demo routes served by `wavesync serve`.

mod counter;
mod hello;
mod todo;

use crate::app::App;

/// Route table with every demo.
pub fn demo() -> App {
    App::new()
        .route("/hello", hello::serve)
        .route("/counter", counter::serve)
        .route("/todo", todo::serve)
}
