//! Timelines, post mutations, media and notifications

use std::sync::Arc;

use serde_json::{Value, json};
use url::Url;

use super::Account;
use crate::api::{Body, Method, MultipartFile, Request};
use crate::error::{Error, Result};
use crate::events::Event;
use crate::json::JsonExt;
use crate::lock::read;
use crate::models::{Attachment, Identity, Notification, NotificationType, Post};

impl Account {
    fn parse_posts(&self, json: &Value) -> Vec<Post> {
        json.as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|item| self.post_from_json(item))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn with_limit(&self, mut url: Url, max_id: Option<&str>) -> Url {
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.inner.config.timeline_limit.to_string());
            if let Some(max_id) = max_id {
                query.append_pair("max_id", max_id);
            }
        }
        url
    }

    fn timeline_url(&self, name: &str) -> Result<Url> {
        match name {
            "home" => self.api_url("/api/v1/timelines/home"),
            "public" => self.api_url("/api/v1/timelines/public"),
            "local" => {
                let mut url = self.api_url("/api/v1/timelines/public")?;
                url.query_pairs_mut().append_pair("local", "true");
                Ok(url)
            }
            "bookmarks" => self.api_url("/api/v1/bookmarks"),
            "favourites" => self.api_url("/api/v1/favourites"),
            other => match other.strip_prefix("tag/") {
                Some(tag) if !tag.is_empty() => {
                    self.api_url(&format!("/api/v1/timelines/tag/{}", urlencoding::encode(tag)))
                }
                _ => Err(Error::UnknownTimeline(other.to_string())),
            },
        }
    }

    /// Fetch a page of a timeline: `home`, `public`, `local`, `bookmarks`,
    /// `favourites` or `tag/<name>`. Pass the last seen id as `max_id` for
    /// older posts. Emits [`Event::TimelineFetched`].
    pub async fn fetch_timeline(&self, name: &str, max_id: Option<&str>) -> Result<Vec<Post>> {
        let url = self.with_limit(self.timeline_url(name)?, max_id);
        let posts = self.parse_posts(&self.get(url, true).await?.json());

        tracing::debug!("{} posts on {name}", posts.len());
        self.inner.events.emit(Event::TimelineFetched {
            timeline: name.to_string(),
            posts: posts.clone(),
        });
        Ok(posts)
    }

    /// A post with its ancestors before it and its replies after it
    pub async fn fetch_thread(&self, post_id: &str) -> Result<Vec<Post>> {
        let status_url = self.api_url(&format!("/api/v1/statuses/{post_id}"))?;
        let context_url = self.api_url(&format!("/api/v1/statuses/{post_id}/context"))?;

        let (status, context) = tokio::try_join!(self.get(status_url, true), self.get(context_url, true))?;
        let context = context.json();

        let mut thread = self.parse_posts(context.at("ancestors"));
        thread.push(self.post_from_json(&status.json()));
        thread.extend(self.parse_posts(context.at("descendants")));
        Ok(thread)
    }

    /// Posts by one account (by server-side id)
    pub async fn fetch_account_statuses(&self, account_id: &str, exclude_replies: bool) -> Result<Vec<Post>> {
        let mut url = self.with_limit(
            self.api_url(&format!("/api/v1/accounts/{account_id}/statuses"))?,
            None,
        );
        if exclude_replies {
            url.query_pairs_mut().append_pair("exclude_replies", "true");
        }
        Ok(self.parse_posts(&self.get(url, true).await?.json()))
    }

    async fn mutate_post(&self, post_id: &str, verb: &str, deliver_home: bool) -> Result<Post> {
        let url = self.api_url(&format!("/api/v1/statuses/{post_id}/{verb}"))?;
        let json = self.post(url, json!({}), true).await?.json();
        let post = self.post_from_json(&json);

        if deliver_home {
            self.inner.events.emit(Event::TimelineFetched {
                timeline: "home".to_string(),
                posts: vec![post.clone()],
            });
        }
        Ok(post)
    }

    /// Favourite a post
    pub async fn favorite(&self, post: &Post) -> Result<Post> {
        self.mutate_post(&post.id, "favourite", false).await
    }

    /// Undo a favourite
    pub async fn unfavorite(&self, post: &Post) -> Result<Post> {
        self.mutate_post(&post.id, "unfavourite", false).await
    }

    /// Boost a post; the boost is delivered to the home timeline
    pub async fn repeat(&self, post: &Post) -> Result<Post> {
        self.mutate_post(&post.id, "reblog", true).await
    }

    /// Undo a boost
    pub async fn unrepeat(&self, post: &Post) -> Result<Post> {
        self.mutate_post(&post.id, "unreblog", false).await
    }

    /// Bookmark a post
    pub async fn bookmark(&self, post: &Post) -> Result<Post> {
        self.mutate_post(&post.id, "bookmark", true).await
    }

    /// Remove a bookmark
    pub async fn unbookmark(&self, post: &Post) -> Result<Post> {
        self.mutate_post(&post.id, "unbookmark", false).await
    }

    /// Pin one of our posts to our profile
    pub async fn pin(&self, post: &Post) -> Result<Post> {
        self.mutate_post(&post.id, "pin", true).await
    }

    /// Unpin
    pub async fn unpin(&self, post: &Post) -> Result<Post> {
        self.mutate_post(&post.id, "unpin", false).await
    }

    /// A blank draft by us. Uses the server-side posting preferences once
    /// fetched, otherwise the visibility from our profile.
    pub fn new_post(&self) -> Post {
        let identity = self.identity();
        let visibility = identity.visibility();
        let mut draft = Post::draft(identity, visibility);
        if let Some(preferences) = read(&self.inner.preferences).as_ref() {
            preferences.apply_posting(&mut draft);
        }
        draft
    }

    /// Publish a draft
    pub async fn post_status(&self, draft: &Post) -> Result<Post> {
        let request = Request::new(Method::Post, self.api_url("/api/v1/statuses")?)
            .bearer(self.bearer(true))
            .header("Idempotency-Key", &uuid::Uuid::new_v4().to_string())
            .body(Body::Json(draft.to_json()));

        let json = self.inner.gateway.send(request).await?.json();
        let post = self.post_from_json(&json);
        tracing::info!("posted {}", post.id);
        Ok(post)
    }

    /// Upload media to attach to a draft
    pub async fn upload_media(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        mime: &str,
        description: Option<&str>,
    ) -> Result<Attachment> {
        let file = MultipartFile {
            file_name: file_name.to_string(),
            mime: mime.to_string(),
            bytes,
            fields: description
                .filter(|d| !d.is_empty())
                .map(|d| vec![("description".to_string(), d.to_string())])
                .unwrap_or_default(),
        };

        let json = self.upload(self.api_url("/api/v2/media")?, file).await?.json();
        Ok(Attachment::from_json(&json))
    }

    /// Save an attachment's description
    pub async fn update_attachment(&self, attachment: &Attachment) -> Result<()> {
        let url = self.api_url(&format!("/api/v1/media/{}", attachment.id))?;
        self.put(url, json!({ "description": attachment.description }), true)
            .await?;
        self.inner.events.emit(Event::AttachmentUpdated {
            attachment_id: attachment.id.clone(),
        });
        Ok(())
    }

    /// Fetch an attachment's preview in the background; see
    /// [`Attachment::fetch_preview`]
    pub fn fetch_attachment_preview(&self, attachment: &Attachment) {
        attachment.fetch_preview(self.transport(), self.inner.events.clone());
    }

    fn note_follow_request(&self, notification: &Notification) {
        if notification.kind == NotificationType::FollowRequest {
            self.set_has_follow_requests(true);
        }
    }

    fn notification_from_json(&self, json: &Value) -> Notification {
        let mut notification = Notification::from_json(&self.inner.cache, json);
        if let Some(post) = notification.post.as_mut() {
            if let Some(preferences) = read(&self.inner.preferences).as_ref() {
                preferences.apply_reading(post);
            }
        }
        notification
    }

    /// Fetch a page of notifications
    pub async fn fetch_notifications(&self, max_id: Option<&str>) -> Result<Vec<Notification>> {
        let url = self.with_limit(self.api_url("/api/v1/notifications")?, max_id);
        let json = self.get(url, true).await?.json();

        let notifications: Vec<_> = json
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|item| self.notification_from_json(item))
                    .collect()
            })
            .unwrap_or_default();

        for notification in &notifications {
            self.note_follow_request(notification);
        }
        Ok(notifications)
    }

    /// Parse a pushed notification and announce it
    pub fn handle_notification(&self, json: &Value) -> Arc<Notification> {
        let notification = Arc::new(self.notification_from_json(json));
        self.note_follow_request(&notification);
        self.inner
            .events
            .emit(Event::Notification(Arc::clone(&notification)));
        notification
    }

    /// Resolve `user@domain` to an identity and refresh it
    pub async fn lookup_account(&self, acct: &str) -> Result<Arc<Identity>> {
        let mut url = self.api_url("/api/v1/accounts/lookup")?;
        url.query_pairs_mut()
            .append_pair("acct", acct.trim_start_matches('@'));
        let json = self.get(url, true).await?.json();
        Ok(self.refresh_identity(&json))
    }

    /// Fetch an account by server-side id and refresh its identity
    pub async fn fetch_identity(&self, account_id: &str) -> Result<Arc<Identity>> {
        let url = self.api_url(&format!("/api/v1/accounts/{account_id}"))?;
        let json = self.get(url, true).await?.json();
        Ok(self.refresh_identity(&json))
    }

    fn refresh_identity(&self, json: &Value) -> Arc<Identity> {
        let identity = self.inner.cache.refresh(json);
        self.inner.events.emit(Event::IdentityChanged {
            acct: identity.acct(),
        });
        identity
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::tests::logged_in;
    use super::*;
    use crate::api::MockTransport;
    use crate::models::Visibility;

    fn status(id: &str, acct: &str) -> Value {
        json!({"id": id, "account": {"id": "5", "acct": acct}, "content": "<p>x</p>"})
    }

    #[tokio::test]
    async fn test_fetch_timeline_shares_identities() {
        let mock = Arc::new(MockTransport::new());
        mock.on_json(
            Method::Get,
            "/api/v1/timelines/home",
            200,
            &json!([status("2", "alice"), status("1", "alice")]),
        );
        let account = logged_in(&mock);
        let mut rx = account.subscribe();

        let posts = account.fetch_timeline("home", Some("3")).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert!(Arc::ptr_eq(&posts[0].author_identity, &posts[1].author_identity));

        let sent = &mock.requests_to("/api/v1/timelines/home")[0];
        assert_eq!(sent.bearer.as_deref(), Some("tok"));
        assert_eq!(sent.url.query(), Some("limit=20&max_id=3"));
        assert!(matches!(rx.recv().await.unwrap(), Event::TimelineFetched { ref timeline, .. } if timeline == "home"));
    }

    #[tokio::test]
    async fn test_timeline_names() {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::Get, "/api/v1/timelines/public", 200, "[]")
            .on(Method::Get, "/api/v1/timelines/tag/rust", 200, "[]");
        let account = logged_in(&mock);

        account.fetch_timeline("local", None).await.unwrap();
        account.fetch_timeline("tag/rust", None).await.unwrap();
        assert!(matches!(
            account.fetch_timeline("nowhere", None).await,
            Err(Error::UnknownTimeline(_))
        ));

        let local = &mock.requests_to("/api/v1/timelines/public")[0];
        assert_eq!(local.url.query(), Some("local=true&limit=20"));
    }

    #[tokio::test]
    async fn test_fetch_thread_order() {
        let mock = Arc::new(MockTransport::new());
        mock.on_json(Method::Get, "/api/v1/statuses/2", 200, &status("2", "bob"))
            .on_json(
                Method::Get,
                "/api/v1/statuses/2/context",
                200,
                &json!({"ancestors": [status("1", "alice")], "descendants": [status("3", "carol")]}),
            );
        let account = logged_in(&mock);

        let ids: Vec<_> = account
            .fetch_thread("2")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_repeat_delivers_home() {
        let mock = Arc::new(MockTransport::new());
        let mut boosted = status("20", "me");
        boosted["reblog"] = status("10", "alice");
        boosted["reblogged"] = json!(true);
        mock.on_json(Method::Post, "/api/v1/statuses/10/reblog", 200, &boosted)
            .on_json(Method::Post, "/api/v1/statuses/10/favourite", 200, &status("10", "alice"));
        let account = logged_in(&mock);
        let mut rx = account.subscribe();
        let original = Post::from_json(account.cache(), &status("10", "alice"));

        account.favorite(&original).await.unwrap();
        let boost = account.repeat(&original).await.unwrap();

        assert!(boost.repeat && boost.repeated);
        assert!(matches!(rx.try_recv(), Ok(Event::TimelineFetched { ref posts, .. }) if posts[0].id == "20"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_post_status() {
        let mock = Arc::new(MockTransport::new());
        mock.on_json(Method::Post, "/api/v1/statuses", 200, &status("77", "me"));
        let account = logged_in(&mock);

        let mut draft = account.new_post();
        assert_eq!(draft.visibility, Visibility::Public);
        draft.content = "hello".into();
        draft.visibility = Visibility::Unlisted;

        let post = account.post_status(&draft).await.unwrap();
        assert_eq!(post.id, "77");

        let sent = &mock.requests_to("/api/v1/statuses")[0];
        assert!(sent.headers.iter().any(|(k, _)| k == "Idempotency-Key"));
        assert_eq!(sent.json_body().map(|b| b["visibility"].clone()), Some(json!("unlisted")));
    }

    #[tokio::test]
    async fn test_upload_and_describe() {
        let mock = Arc::new(MockTransport::new());
        mock.on_json(
            Method::Post,
            "/api/v2/media",
            202,
            &json!({"id": "m9", "type": "image", "url": null, "preview_url": "https://e/p.png"}),
        )
        .on(Method::Put, "/api/v1/media/m9", 200, "{}");
        let account = logged_in(&mock);

        let mut attachment = account
            .upload_media("cat.png", vec![1, 2, 3], "image/png", Some("a cat"))
            .await
            .unwrap();
        assert_eq!(attachment.id, "m9");

        attachment.description = "a sleepy cat".into();
        account.update_attachment(&attachment).await.unwrap();
        let put = &mock.requests_to("/api/v1/media/m9")[0];
        assert_eq!(put.json_body(), Some(&json!({"description": "a sleepy cat"})));
    }

    #[tokio::test]
    async fn test_follow_request_notification() {
        let account = logged_in(&Arc::new(MockTransport::new()));
        let mut rx = account.subscribe();

        let n = account.handle_notification(&json!({
            "id": "1", "type": "follow_request", "account": {"acct": "dave"}
        }));
        assert_eq!(n.kind, NotificationType::FollowRequest);
        assert!(account.has_follow_requests());
        assert!(matches!(rx.try_recv(), Ok(Event::FollowRequestsChanged(true))));
        assert!(matches!(rx.try_recv(), Ok(Event::Notification(_))));
    }

    #[tokio::test]
    async fn test_fetch_notifications() {
        let mock = Arc::new(MockTransport::new());
        mock.on_json(
            Method::Get,
            "/api/v1/notifications",
            200,
            &json!([
                {"id": "2", "type": "favourite", "account": {"acct": "erin"}, "status": status("5", "me")},
                {"id": "1", "type": "admin.sign_up", "account": {"acct": "frank"}}
            ]),
        );
        let account = logged_in(&mock);

        let list = account.fetch_notifications(None).await.unwrap();
        assert_eq!(list[0].kind, NotificationType::Favorite);
        assert!(list[0].post.is_some());
        assert_eq!(list[1].kind, NotificationType::Unknown);
        assert!(!account.has_follow_requests());
    }

    #[tokio::test]
    async fn test_lookup_account_refreshes() {
        let mock = Arc::new(MockTransport::new());
        mock.on_json(
            Method::Get,
            "/api/v1/accounts/lookup",
            200,
            &json!({"id": "5", "acct": "alice", "display_name": "Alice Fresh"}),
        );
        let account = logged_in(&mock);
        let cached = account.identity_lookup("alice", &json!({"acct": "alice", "display_name": "Old"}));

        let found = account.lookup_account("@alice").await.unwrap();
        assert!(Arc::ptr_eq(&cached, &found));
        assert_eq!(cached.display_name(), "Alice Fresh");
        assert_eq!(mock.requests_to("/api/v1/accounts/lookup")[0].url.query(), Some("acct=alice"));
    }

    #[tokio::test]
    async fn test_repeated_follow_requests_announce_once() {
        let account = logged_in(&Arc::new(MockTransport::new()));
        let mut rx = account.subscribe();
        let request = json!({"id": "1", "type": "follow_request", "account": {"acct": "dave"}});

        account.handle_notification(&request);
        account.handle_notification(&request);

        let changes = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| matches!(e, Event::FollowRequestsChanged(_)))
            .count();
        assert_eq!(changes, 1);

        account.set_has_follow_requests(false);
        account.handle_notification(&request);
        assert!(account.has_follow_requests());
    }

    #[tokio::test]
    async fn test_preferences_shape_drafts_and_posts() {
        let mock = Arc::new(MockTransport::new());
        let mut hidden = status("4", "alice");
        hidden["spoiler_text"] = json!("spoilers");
        mock.on_json(
            Method::Get,
            "/api/v1/preferences",
            200,
            &json!({
                "posting:default:visibility": "private",
                "posting:default:sensitive": true,
                "posting:default:language": "nl",
                "reading:expand:media": "hide_all",
                "reading:expand:spoilers": true
            }),
        )
        .on_json(Method::Get, "/api/v1/timelines/home", 200, &json!([hidden]))
        .on_json(Method::Post, "/api/v1/statuses", 200, &status("78", "me"));
        let account = logged_in(&mock);

        assert_eq!(account.new_post().visibility, Visibility::Public);
        account.fetch_preferences().await.unwrap();

        let draft = account.new_post();
        assert_eq!(draft.visibility, Visibility::Private);
        assert!(draft.sensitive);
        assert_eq!(draft.language.as_deref(), Some("nl"));

        account.post_status(&draft).await.unwrap();
        let body = mock.requests_to("/api/v1/statuses")[0].json_body().cloned().unwrap();
        assert_eq!(body["language"], "nl");

        let posts = account.fetch_timeline("home", None).await.unwrap();
        assert!(posts[0].expanded);
        assert!(!posts[0].attachments_visible);
    }
}
