use tracefire::error::AppResult;

fn main() -> AppResult<()> {
    tracefire::run()
}
