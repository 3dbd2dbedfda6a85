use anyhow::Result;
use reqwest::StatusCode;

use crate::helpers::spawn_app;

#[tokio::test]
async fn failing_handler_returns_500_with_error_message() -> Result<()> {
    // Arrange
    let app = spawn_app().await?;
    let client = reqwest::Client::new();

    // Act
    let response = client.get(format!("{}/error", app.address)).send().await?;

    // Assert
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.text().await?,
        "Something has gone terribly wrong!"
    );
    assert_eq!(app.flushes(), 1);

    Ok(())
}

#[tokio::test]
async fn every_failing_request_is_flushed() -> Result<()> {
    // Arrange
    let app = spawn_app().await?;
    let client = reqwest::Client::new();

    // Act
    for _ in 0..3 {
        let response = client.get(format!("{}/error", app.address)).send().await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    // Assert
    assert_eq!(app.flushes(), 3);

    Ok(())
}
