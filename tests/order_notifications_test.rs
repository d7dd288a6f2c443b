mod common;

use common::{execute, harness, CHAT_ID};
use shop_backend::domain::TaskStatus;
use shop_backend::storage::Storage;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_order_creation_sends_delayed_telegram_message() -> anyhow::Result<()> {
    let app = harness(Duration::from_millis(150));
    execute(
        &app.schema,
        r#"mutation { createProduct(title: "Lamp", price: "19.99", summary: "", is18Plus: false) { product { id } } }"#,
    )
    .await;
    execute(&app.schema, r#"mutation { createUser(username: "bob", email: "bob@example.com") { id } }"#).await;

    let started = Instant::now();
    let (data, errors) = execute(
        &app.schema,
        r#"mutation { createOrder(inputData: { userId: "2", productIds: ["1"] }) { order { uuid } } }"#,
    )
    .await;
    assert!(errors.is_empty(), "{errors:?}");
    let uuid = data["createOrder"]["order"]["uuid"].as_str().unwrap().to_string();

    // Nothing goes out before the countdown
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(app.recorder.messages.lock().await.is_empty());

    app.worker.shutdown().await;
    assert!(started.elapsed() >= Duration::from_millis(150));

    let messages = app.recorder.messages.lock().await;
    assert_eq!(messages.len(), 1);
    let (chat_id, text) = &messages[0];
    assert_eq!(*chat_id, CHAT_ID);
    assert!(text.starts_with(&format!("New order {uuid} created at ")));
    assert!(text.ends_with("\nLamp - 1 - 19.99\n"));

    let results = app.storage.list_task_results(10).await?;
    let notification = results
        .iter()
        .find(|r| r.task_name == "order_send_telegram_message")
        .expect("order notification recorded");
    assert_eq!(notification.status, TaskStatus::Success);
    Ok(())
}

#[tokio::test]
async fn test_user_creation_sends_welcome_email() -> anyhow::Result<()> {
    let app = harness(Duration::ZERO);
    let (_, errors) = execute(
        &app.schema,
        r#"mutation { createUser(username: "carol", email: "carol@example.com") { id } }"#,
    )
    .await;
    assert!(errors.is_empty(), "{errors:?}");
    app.worker.shutdown().await;

    let emails = app.recorder.emails.lock().await;
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].to, "carol@example.com");
    assert_eq!(emails[0].subject, "Welcome to our service");
    assert_eq!(emails[0].text_body, "Hello, carol! Welcome to our service!");
    Ok(())
}

#[tokio::test]
async fn test_deleted_order_notifies_and_pending_creation_message_fails() -> anyhow::Result<()> {
    let app = harness(Duration::from_millis(50));
    execute(
        &app.schema,
        r#"mutation { createProduct(title: "Lamp", price: "19.99", summary: "", is18Plus: false) { product { id } } }"#,
    )
    .await;
    execute(&app.schema, r#"mutation { createUser(username: "bob", email: "bob@example.com") { id } }"#).await;
    let (data, _) = execute(
        &app.schema,
        r#"mutation { createOrder(inputData: { userId: "2", productIds: ["1"] }) { order { uuid } } }"#,
    )
    .await;
    let uuid = data["createOrder"]["order"]["uuid"].as_str().unwrap().to_string();

    // Deleted before the countdown elapses
    let (data, _) = execute(&app.schema, &format!(r#"mutation {{ deleteOrder(uuid: "{uuid}") }}"#)).await;
    assert_eq!(data["deleteOrder"], serde_json::json!(true));
    app.worker.shutdown().await;

    let messages = app.recorder.messages.lock().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].1, format!("Order {uuid} deleted"));

    let results = app.storage.list_task_results(10).await?;
    let created = results
        .iter()
        .find(|r| r.task_name == "order_send_telegram_message")
        .expect("creation message recorded");
    assert_eq!(created.status, TaskStatus::Failure);
    assert_eq!(created.attempts, 2);
    assert_eq!(created.error.as_deref(), Some(format!("Order {uuid} not found").as_str()));
    Ok(())
}

#[tokio::test]
async fn test_task_results_exposed_over_graphql() {
    let app = harness(Duration::ZERO);
    execute(&app.schema, r#"mutation { createUser(username: "dave", email: "dave@example.com") { id } }"#).await;

    // Wait for the welcome email job to finish
    for _ in 0..50 {
        if !app.recorder.emails.lock().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (data, errors) = execute(&app.schema, "{ taskResults(limit: 5) { taskName status attempts } }").await;
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(
        data["taskResults"],
        serde_json::json!([{"taskName": "send_welcome_email", "status": "SUCCESS", "attempts": 1}])
    );
    app.worker.shutdown().await;
}
