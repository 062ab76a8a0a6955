//! Backend-independent repository scenarios, run against SQLite and PostgreSQL
#![allow(dead_code)]

pub mod database_test_utils;

use std::sync::Arc;

use anyhow::Result;
use marketplace_domain::{
    ItemFilter, ItemInput, ItemPatch, ItemStatus, MarketplaceError, MarketplaceItemRepository,
    NewUser, UserRepository,
};
use uuid::Uuid;

pub struct Repositories {
    pub items: Arc<dyn MarketplaceItemRepository>,
    pub users: Arc<dyn UserRepository>,
}

pub fn sample_input(name: &str) -> ItemInput {
    ItemInput {
        name: Some(name.to_string()),
        author: Some("openpai".to_string()),
        category: Some("ai".to_string()),
        tags: vec!["tensorflow".to_string(), "gpu".to_string()],
        introduction: Some("short intro".to_string()),
        description: Some("long description".to_string()),
        job_config: Some(serde_json::json!({
            "protocolVersion": 2,
            "taskRoles": {"worker": {"instances": 1}}
        })),
        status: Some(ItemStatus::Pending),
    }
}

pub async fn create_user(repos: &Repositories, username: &str) -> Result<Uuid> {
    let user = repos
        .users
        .create(&NewUser {
            username: username.to_string(),
            email: Some(format!("{username}@example.com")),
        })
        .await?;
    Ok(user.id)
}

pub async fn create_then_get_round_trips_fields(repos: &Repositories) -> Result<()> {
    let input = sample_input("demo");
    let id = repos.items.create(&input).await?;

    let item = repos.items.get(id).await?.expect("created item should exist");
    assert_eq!(item.id, id);
    assert_eq!(item.name, input.name);
    assert_eq!(item.author, input.author);
    assert_eq!(item.category, input.category);
    assert_eq!(item.tags, input.tags);
    assert_eq!(item.introduction, input.introduction);
    assert_eq!(item.description, input.description);
    assert_eq!(item.job_config, input.job_config);
    assert_eq!(item.status, input.status);
    assert_eq!(item.submits, 0);
    assert_eq!(item.star_number, 0);

    // 只有 id 的最小条目
    let id = repos.items.create(&ItemInput::default()).await?;
    let item = repos.items.get(id).await?.expect("created item should exist");
    assert_eq!(item.name, None);
    assert!(item.tags.is_empty());
    assert_eq!(item.job_config, None);
    assert_eq!(item.status, None);
    Ok(())
}

pub async fn list_applies_every_filter(repos: &Repositories) -> Result<()> {
    let mut first = sample_input("alpha");
    first.category = Some("cv".to_string());
    let first = repos.items.create(&first).await?;

    let mut second = sample_input("beta");
    second.status = Some(ItemStatus::Approved);
    let second = repos.items.create(&second).await?;

    let mut third = sample_input("gamma");
    third.author = Some("someone-else".to_string());
    third.status = None;
    let third = repos.items.create(&third).await?;

    let ids = |items: Vec<marketplace_domain::MarketplaceItem>| {
        let mut ids: Vec<Uuid> = items.into_iter().map(|item| item.id).collect();
        ids.sort();
        ids
    };
    let sorted = |mut ids: Vec<Uuid>| {
        ids.sort();
        ids
    };

    let all = repos.items.list(&ItemFilter::default()).await?;
    assert_eq!(ids(all), sorted(vec![first, second, third]));

    let by_author = ItemFilter {
        author: Some("openpai".to_string()),
        ..Default::default()
    };
    assert_eq!(ids(repos.items.list(&by_author).await?), sorted(vec![first, second]));

    let by_author_and_category = ItemFilter {
        author: Some("openpai".to_string()),
        category: Some("ai".to_string()),
        ..Default::default()
    };
    assert_eq!(ids(repos.items.list(&by_author_and_category).await?), vec![second]);

    let by_status = ItemFilter {
        status: Some(ItemStatus::Pending),
        ..Default::default()
    };
    assert_eq!(ids(repos.items.list(&by_status).await?), vec![first]);

    let by_name = ItemFilter {
        name: Some("gamma".to_string()),
        ..Default::default()
    };
    assert_eq!(ids(repos.items.list(&by_name).await?), vec![third]);

    // 空字符串等同于未给出该条件
    let blank_author = ItemFilter {
        author: Some(String::new()),
        status: Some(ItemStatus::Approved),
        ..Default::default()
    };
    assert_eq!(ids(repos.items.list(&blank_author).await?), vec![second]);

    let nothing = ItemFilter {
        name: Some("alpha".to_string()),
        status: Some(ItemStatus::Rejected),
        ..Default::default()
    };
    assert!(repos.items.list(&nothing).await?.is_empty());
    Ok(())
}

pub async fn concurrent_submits_are_not_lost(repos: &Repositories, calls: usize) -> Result<()> {
    let id = repos.items.create(&sample_input("busy")).await?;

    let results = futures::future::join_all((0..calls).map(|_| {
        let items = Arc::clone(&repos.items);
        async move { items.update_submits(id).await }
    }))
    .await;

    for result in results {
        assert!(result?.is_some());
    }

    let item = repos.items.get(id).await?.expect("item should exist");
    assert_eq!(item.submits, calls as i32);
    Ok(())
}

pub async fn missing_ids_return_none(repos: &Repositories) -> Result<()> {
    let missing = Uuid::new_v4();
    let user = create_user(repos, "lonely").await?;

    assert!(repos.items.get(missing).await?.is_none());
    let patch = ItemPatch {
        name: Some(Some("x".to_string())),
        ..Default::default()
    };
    assert!(repos.items.update(missing, &patch).await?.is_none());
    assert!(repos.items.update(missing, &ItemPatch::default()).await?.is_none());
    assert!(repos.items.update_description(missing, "x").await?.is_none());
    assert!(repos
        .items
        .update_status(missing, ItemStatus::Approved)
        .await?
        .is_none());
    assert!(repos.items.update_submits(missing).await?.is_none());
    assert!(repos.items.delete(missing).await?.is_none());
    assert!(repos.items.list_star_users(missing).await?.is_none());
    assert!(repos.items.add_star(missing, user).await?.is_none());
    assert!(repos.items.remove_star(missing, user).await?.is_none());
    assert!(repos.users.get_by_id(missing).await?.is_none());
    Ok(())
}

pub async fn delete_then_get_is_none(repos: &Repositories) -> Result<()> {
    let id = repos.items.create(&sample_input("short-lived")).await?;

    let deleted = repos.items.delete(id).await?.expect("item should be deleted");
    assert_eq!(deleted.id, id);
    assert!(repos.items.get(id).await?.is_none());
    assert!(repos.items.delete(id).await?.is_none());
    Ok(())
}

pub async fn status_update_leaves_other_fields(repos: &Repositories) -> Result<()> {
    let input = ItemInput {
        name: Some("demo".to_string()),
        status: Some(ItemStatus::Pending),
        ..Default::default()
    };
    let id = repos.items.create(&input).await?;
    let before = repos.items.get(id).await?.expect("item should exist");

    let after = repos
        .items
        .update_status(id, ItemStatus::Approved)
        .await?
        .expect("item should exist");
    assert_eq!(after.status, Some(ItemStatus::Approved));
    assert_eq!(after.id, before.id);
    assert_eq!(after.name, before.name);
    assert_eq!(after.tags, before.tags);
    assert_eq!(after.job_config, before.job_config);
    assert_eq!(after.submits, before.submits);
    assert_eq!(after.star_number, before.star_number);
    assert!(after.updated_at >= before.updated_at);

    // 状态可以任意流转
    let reverted = repos
        .items
        .update_status(id, ItemStatus::Pending)
        .await?
        .expect("item should exist");
    assert_eq!(reverted.status, Some(ItemStatus::Pending));

    let stars = repos.items.list_star_users(id).await?.expect("item should exist");
    assert!(stars.is_empty());
    Ok(())
}

pub async fn partial_updates(repos: &Repositories) -> Result<()> {
    let id = repos.items.create(&sample_input("original")).await?;

    let patch = ItemPatch {
        name: Some(Some("renamed".to_string())),
        tags: Some(vec!["pytorch".to_string()]),
        job_config: Some(Some(serde_json::json!({"protocolVersion": 3}))),
        ..Default::default()
    };
    let updated = repos.items.update(id, &patch).await?.expect("item should exist");
    assert_eq!(updated.name.as_deref(), Some("renamed"));
    assert_eq!(updated.tags, vec!["pytorch".to_string()]);
    assert_eq!(updated.job_config, Some(serde_json::json!({"protocolVersion": 3})));
    assert_eq!(updated.author.as_deref(), Some("openpai"));
    assert_eq!(updated.description.as_deref(), Some("long description"));
    assert_eq!(updated.status, Some(ItemStatus::Pending));

    let unchanged = repos
        .items
        .update(id, &ItemPatch::default())
        .await?
        .expect("item should exist");
    assert_eq!(unchanged.name.as_deref(), Some("renamed"));

    let described = repos
        .items
        .update_description(id, "rewritten")
        .await?
        .expect("item should exist");
    assert_eq!(described.description.as_deref(), Some("rewritten"));
    assert_eq!(described.name.as_deref(), Some("renamed"));

    let submitted = repos.items.update_submits(id).await?.expect("item should exist");
    assert_eq!(submitted.submits, 1);
    assert_eq!(submitted.description.as_deref(), Some("rewritten"));
    Ok(())
}

pub async fn update_clears_nullable_fields(repos: &Repositories) -> Result<()> {
    let id = repos.items.create(&sample_input("clearable")).await?;

    // 显式 null 清空字段，缺省的键保持不变
    let patch: ItemPatch = serde_json::from_str(r#"{"status": null, "description": null}"#)?;
    let cleared = repos.items.update(id, &patch).await?.expect("item should exist");
    assert_eq!(cleared.status, None);
    assert_eq!(cleared.description, None);
    assert_eq!(cleared.name.as_deref(), Some("clearable"));
    assert_eq!(cleared.author.as_deref(), Some("openpai"));
    assert!(cleared.job_config.is_some());

    let patch = ItemPatch {
        job_config: Some(None),
        author: Some(None),
        status: Some(Some(ItemStatus::Rejected)),
        ..Default::default()
    };
    let updated = repos.items.update(id, &patch).await?.expect("item should exist");
    assert_eq!(updated.job_config, None);
    assert_eq!(updated.author, None);
    assert_eq!(updated.status, Some(ItemStatus::Rejected));

    let stored = repos.items.get(id).await?.expect("item should exist");
    assert_eq!(stored, updated);
    Ok(())
}

pub async fn star_relations(repos: &Repositories) -> Result<()> {
    let id = repos.items.create(&sample_input("starred")).await?;
    let alice = create_user(repos, "alice").await?;
    let bob = create_user(repos, "bob").await?;

    assert_eq!(repos.items.add_star(id, alice).await?, Some(true));
    assert_eq!(repos.items.add_star(id, bob).await?, Some(true));
    assert_eq!(repos.items.add_star(id, alice).await?, Some(false));

    let mut usernames: Vec<String> = repos
        .items
        .list_star_users(id)
        .await?
        .expect("item should exist")
        .into_iter()
        .map(|user| user.username)
        .collect();
    usernames.sort();
    assert_eq!(usernames, vec!["alice".to_string(), "bob".to_string()]);

    // 收藏计数不随关系表变化
    let item = repos.items.get(id).await?.expect("item should exist");
    assert_eq!(item.star_number, 0);

    assert_eq!(repos.items.remove_star(id, alice).await?, Some(true));
    assert_eq!(repos.items.remove_star(id, alice).await?, Some(false));
    let users = repos.items.list_star_users(id).await?.expect("item should exist");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, bob);
    assert_eq!(users[0].email.as_deref(), Some("bob@example.com"));

    // 删除条目时由数据库级联删除收藏关系
    repos.items.delete(id).await?;
    assert!(repos.items.list_star_users(id).await?.is_none());
    Ok(())
}

pub async fn constraint_violations_are_validation_errors(repos: &Repositories) -> Result<()> {
    let id = repos.items.create(&sample_input("guarded")).await?;

    let error = repos
        .items
        .add_star(id, Uuid::new_v4())
        .await
        .expect_err("unknown user must be rejected");
    assert!(error.is_validation(), "unexpected error: {error:?}");
    assert!(matches!(
        error,
        MarketplaceError::Validation {
            source: sqlx::Error::Database(_),
            ..
        }
    ));

    create_user(repos, "carol").await?;
    let error = repos
        .users
        .create(&NewUser {
            username: "carol".to_string(),
            email: None,
        })
        .await
        .expect_err("duplicate username must be rejected");
    assert!(error.is_validation(), "unexpected error: {error:?}");

    let found = repos.users.get_by_username("carol").await?.expect("user should exist");
    assert_eq!(found.username, "carol");
    assert!(repos.users.get_by_username("nobody").await?.is_none());
    Ok(())
}
