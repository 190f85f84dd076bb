//! Named groups and their member sets.

use anyhow::{Context, Result};
use chat_hub::{GroupDescriptor, Identity};
use sqlx::Row;
use std::collections::BTreeSet;

use super::ChatRepository;

impl ChatRepository {
    /// Create a group. The creator is always stored as a member. Returns
    /// `None` if the name is taken.
    pub async fn create_group(
        &self,
        name: &str,
        creator: &Identity,
        members: &BTreeSet<Identity>,
    ) -> Result<Option<GroupDescriptor>> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO chat_groups (name, creator, created_at) VALUES (?, ?, unixepoch())",
        )
        .bind(name)
        .bind(creator.as_str())
        .execute(&mut *tx)
        .await
        .context("Failed to insert group")?;

        if inserted.rows_affected() == 0 {
            return Ok(None);
        }

        let mut all = members.clone();
        all.insert(creator.clone());
        for member in &all {
            sqlx::query("INSERT INTO group_members (group_name, member) VALUES (?, ?)")
                .bind(name)
                .bind(member.as_str())
                .execute(&mut *tx)
                .await
                .context("Failed to insert group member")?;
        }

        tx.commit().await?;

        Ok(Some(GroupDescriptor {
            name: name.to_string(),
            creator: creator.clone(),
            members: all,
        }))
    }

    pub async fn get_group(&self, name: &str) -> Result<Option<GroupDescriptor>> {
        let row = sqlx::query("SELECT name, creator FROM chat_groups WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let creator: String = row.get("creator");
        let members = self.group_members(name).await?;
        Ok(Some(GroupDescriptor {
            name: row.get("name"),
            creator: Identity::new(creator)?,
            members,
        }))
    }

    async fn group_members(&self, name: &str) -> Result<BTreeSet<Identity>> {
        let rows = sqlx::query("SELECT member FROM group_members WHERE group_name = ?")
            .bind(name)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|r| Identity::new(r.get::<String, _>("member")).map_err(anyhow::Error::from))
            .collect()
    }

    /// All groups by name, or only those `member` belongs to.
    pub async fn list_groups(&self, member: Option<&str>) -> Result<Vec<GroupDescriptor>> {
        let names: Vec<String> = match member {
            Some(m) => {
                sqlx::query_scalar(
                    "SELECT group_name FROM group_members WHERE member = ? ORDER BY group_name",
                )
                .bind(m)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar("SELECT name FROM chat_groups ORDER BY name")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut groups = Vec::with_capacity(names.len());
        for name in names {
            if let Some(group) = self.get_group(&name).await? {
                groups.push(group);
            }
        }
        Ok(groups)
    }

    /// Returns `false` if already a member.
    pub async fn add_group_member(&self, name: &str, member: &Identity) -> Result<bool> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO group_members (group_name, member) VALUES (?, ?)")
                .bind(name)
                .bind(member.as_str())
                .execute(&self.pool)
                .await
                .context("Failed to add group member")?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns `false` if not a member.
    pub async fn remove_group_member(&self, name: &str, member: &Identity) -> Result<bool> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_name = ? AND member = ?")
            .bind(name)
            .bind(member.as_str())
            .execute(&self.pool)
            .await
            .context("Failed to remove group member")?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the member set of an existing group in one transaction.
    pub async fn replace_group_members(&self, name: &str, members: &BTreeSet<Identity>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<String> = sqlx::query_scalar("SELECT name FROM chat_groups WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            anyhow::bail!("no such group: {}", name);
        }

        sqlx::query("DELETE FROM group_members WHERE group_name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        for member in members {
            sqlx::query("INSERT INTO group_members (group_name, member) VALUES (?, ?)")
                .bind(name)
                .bind(member.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_helpers;

    fn id(name: &str) -> Identity {
        Identity::new(name).unwrap()
    }

    fn set(names: &[&str]) -> BTreeSet<Identity> {
        names.iter().map(|n| id(n)).collect()
    }

    #[tokio::test]
    async fn create_includes_creator() {
        let repo = test_helpers::test_repository().await;
        let group = repo
            .create_group("team", &id("alice"), &set(&["bob"]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(group.members, set(&["alice", "bob"]));

        let fetched = repo.get_group("team").await.unwrap().unwrap();
        assert_eq!(fetched, group);
    }

    #[tokio::test]
    async fn duplicate_name_returns_none() {
        let repo = test_helpers::test_repository().await;
        repo.create_group("team", &id("alice"), &set(&[]))
            .await
            .unwrap();
        let second = repo
            .create_group("team", &id("bob"), &set(&["carol"]))
            .await
            .unwrap();
        assert!(second.is_none());

        let fetched = repo.get_group("team").await.unwrap().unwrap();
        assert_eq!(fetched.creator, id("alice"));
        assert_eq!(fetched.members, set(&["alice"]));
    }

    #[tokio::test]
    async fn unknown_group_is_none() {
        let repo = test_helpers::test_repository().await;
        assert!(repo.get_group("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_filters_by_member() {
        let repo = test_helpers::test_repository().await;
        repo.create_group("b-team", &id("alice"), &set(&["bob"]))
            .await
            .unwrap();
        repo.create_group("a-team", &id("carol"), &set(&[]))
            .await
            .unwrap();

        let all = repo.list_groups(None).await.unwrap();
        let names: Vec<&str> = all.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["a-team", "b-team"]);

        let bobs = repo.list_groups(Some("bob")).await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].name, "b-team");
    }

    #[tokio::test]
    async fn add_and_remove_members() {
        let repo = test_helpers::test_repository().await;
        repo.create_group("team", &id("alice"), &set(&[]))
            .await
            .unwrap();

        assert!(repo.add_group_member("team", &id("bob")).await.unwrap());
        assert!(!repo.add_group_member("team", &id("bob")).await.unwrap());
        assert!(repo.remove_group_member("team", &id("bob")).await.unwrap());
        assert!(!repo.remove_group_member("team", &id("bob")).await.unwrap());

        let group = repo.get_group("team").await.unwrap().unwrap();
        assert_eq!(group.members, set(&["alice"]));
    }

    #[tokio::test]
    async fn replace_members() {
        let repo = test_helpers::test_repository().await;
        repo.create_group("team", &id("alice"), &set(&["bob"]))
            .await
            .unwrap();

        repo.replace_group_members("team", &set(&["carol", "dave"]))
            .await
            .unwrap();
        let group = repo.get_group("team").await.unwrap().unwrap();
        assert_eq!(group.members, set(&["carol", "dave"]));

        assert!(repo.replace_group_members("ghost", &set(&["x"])).await.is_err());
    }
}
