//! Convenience macro for writing an outbox row alongside a business write.

/// Insert a new outbox event within the caller's transaction.
///
/// Simplifies the common pattern of writing an event as part of the same
/// transaction as the business-logic row it describes.
///
/// # Usage
///
/// ```rust,no_run
/// use outbox_core::publish_event;
/// use outbox_core::repository::PgOutboxRepository;
/// use sqlx::PgPool;
/// use uuid::Uuid;
/// use serde_json::json;
///
/// # async fn example(pool: PgPool, repo: PgOutboxRepository) -> Result<(), Box<dyn std::error::Error>> {
/// let mut tx = pool.begin().await?;
/// let user_id = Uuid::new_v4();
///
/// sqlx::query("INSERT INTO users (id, name) VALUES ($1, $2)")
///     .bind(user_id)
///     .bind("Alice")
///     .execute(&mut *tx)
///     .await?;
///
/// publish_event!(&mut tx, &repo, "user", user_id, json!({ "user_id": user_id }))?;
///
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
///
/// # Arguments
///
/// * `$tx` - mutable reference to the open transaction
/// * `$repo` - reference to an `OutboxRepository` implementation
/// * `$aggregate_type` - category string (e.g. `"message"`, `"conversation"`)
/// * `$aggregate_id` - `Uuid` of the business entity
/// * `$payload` - JSON-serializable payload
#[macro_export]
macro_rules! publish_event {
    ($tx:expr, $repo:expr, $aggregate_type:expr, $aggregate_id:expr, $payload:expr) => {{
        use chrono::Utc;
        use uuid::Uuid;
        use $crate::event::NewOutboxEvent;

        let event = NewOutboxEvent {
            aggregate_type: $aggregate_type.to_string(),
            aggregate_id: $aggregate_id,
            payload: serde_json::to_value($payload)?,
        };
        $repo.insert($tx, event, Uuid::new_v4(), Utc::now()).await
    }};
}

#[cfg(test)]
mod tests {
    // Macro tests are compile-time checks; if this file compiles, the macro is
    // syntactically correct.
}
