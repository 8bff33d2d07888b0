//! Internship portal scenario
//!
//! Logs in once, then every iteration walks three independent groups:
//!
//! 1. **CompanyList CRUD**: create, update, delete a company listing
//! 2. **Internship CRUD**: create an internship (update/delete not exercised)
//! 3. **Post & Comment & Like**: create a post, comment, like, unlike, delete
//!
//! Follow-up requests only go out when the create returned 201 with an `ID`.
//! Nothing is retried.

use super::payloads::{Comment, CompanyListing, CompanyListingUpdate, Internship, Post};
use super::{Scenario, VuContext};
use crate::client::{ApiClient, Credentials, ResourceId, Session};
use crate::error::SetupError;
use async_trait::async_trait;
use tracing::{debug, error, info};

pub const GROUP_COMPANY: &str = "CompanyList CRUD";
pub const GROUP_INTERNSHIP: &str = "Internship CRUD";
pub const GROUP_POST: &str = "Post & Comment & Like";

pub const CHECK_COMPANY_CREATE: &str = "[Company] Create success (201)";
pub const CHECK_INTERNSHIP_CREATE: &str = "[Internship] Create success (201)";
pub const CHECK_POST_CREATE: &str = "[Post] Create success (201)";
pub const CHECK_COMMENT_CREATE: &str = "[Comment] Create success (201)";
pub const CHECK_LIKE: &str = "[Like] Success (200)";
pub const CHECK_UNLIKE: &str = "[Unlike] Success (200)";

/// Metric names of every endpoint the scenario touches
pub mod endpoints {
    pub const LOGIN: &str = "POST /login";
    pub const COMPANY_CREATE: &str = "POST /company_lists";
    pub const COMPANY_UPDATE: &str = "PUT /company_lists/{id}";
    pub const COMPANY_DELETE: &str = "DELETE /company_lists/{id}";
    pub const INTERNSHIP_CREATE: &str = "POST /internships";
    pub const POST_CREATE: &str = "POST /posts";
    pub const COMMENT_CREATE: &str = "POST /posts/{id}/comments";
    pub const LIKE: &str = "POST /posts/{id}/like";
    pub const UNLIKE: &str = "DELETE /posts/{id}/like";
    pub const POST_DELETE: &str = "DELETE /posts/{id}";
}

/// The portal CRUD workload
pub struct PortalScenario {
    client: ApiClient,
    credentials: Credentials,
}

impl PortalScenario {
    pub fn new(client: ApiClient, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    async fn company_list_crud(&self, session: &Session, ctx: &VuContext, unique_id: &str) {
        let group = ctx.group(GROUP_COMPANY);

        let payload = CompanyListing::for_run(unique_id);
        let res = self
            .client
            .post(session, "/company_lists", endpoints::COMPANY_CREATE, Some(&payload))
            .await;
        group.check(CHECK_COMPANY_CREATE, res.status_is(201));
        let company_id = res.created_id();

        ctx.sleep(1.0).await;

        if let Some(id) = company_id {
            let update = CompanyListingUpdate::for_run(unique_id);
            self.client
                .put(
                    session,
                    &format!("/company_lists/{}", id),
                    endpoints::COMPANY_UPDATE,
                    &update,
                )
                .await;

            ctx.sleep(1.0).await;

            self.client
                .delete(
                    session,
                    &format!("/company_lists/{}", id),
                    endpoints::COMPANY_DELETE,
                )
                .await;
        } else {
            debug!(vu = ctx.vu, iter = ctx.iter, "company create failed, skipping update/delete");
        }

        group.end();
    }

    async fn internship_crud(&self, session: &Session, ctx: &VuContext, unique_id: &str) {
        let group = ctx.group(GROUP_INTERNSHIP);

        let payload = Internship::for_run(unique_id);
        let res = self
            .client
            .post(session, "/internships", endpoints::INTERNSHIP_CREATE, Some(&payload))
            .await;
        group.check(CHECK_INTERNSHIP_CREATE, res.status_is(201));

        // Update and delete of internships are not part of the workload yet;
        // the created record is left in place.
        if let Some(id) = res.created_id() {
            debug!(vu = ctx.vu, internship_id = %id, "internship created");
        }

        group.end();
    }

    async fn post_comment_like(&self, session: &Session, ctx: &VuContext, unique_id: &str) {
        let group = ctx.group(GROUP_POST);

        let payload = Post::for_run(unique_id, ctx.vu);
        let res = self
            .client
            .post(session, "/posts", endpoints::POST_CREATE, Some(&payload))
            .await;
        group.check(CHECK_POST_CREATE, res.status_is(201));
        let post_id = res.created_id();

        ctx.sleep(1.0).await;

        match post_id {
            Some(id) => self.post_lifecycle(session, ctx, &group, &id).await,
            None => {
                debug!(vu = ctx.vu, iter = ctx.iter, "post create failed, skipping comment/like/delete")
            }
        }

        group.end();
    }

    async fn post_lifecycle(
        &self,
        session: &Session,
        ctx: &VuContext,
        group: &super::GroupScope<'_>,
        id: &ResourceId,
    ) {
        let comment = Comment::for_run(ctx.vu);
        let res = self
            .client
            .post(
                session,
                &format!("/posts/{}/comments", id),
                endpoints::COMMENT_CREATE,
                Some(&comment),
            )
            .await;
        group.check(CHECK_COMMENT_CREATE, res.status_is(201));

        ctx.sleep(1.0).await;

        let like_path = format!("/posts/{}/like", id);
        let res = self
            .client
            .post::<()>(session, &like_path, endpoints::LIKE, None)
            .await;
        group.check(CHECK_LIKE, res.status_is(200));

        ctx.sleep(0.5).await;

        let res = self
            .client
            .delete(session, &like_path, endpoints::UNLIKE)
            .await;
        group.check(CHECK_UNLIKE, res.status_is(200));

        ctx.sleep(1.0).await;

        self.client
            .delete(session, &format!("/posts/{}", id), endpoints::POST_DELETE)
            .await;
    }
}

#[async_trait]
impl Scenario for PortalScenario {
    async fn setup(&self) -> Result<Session, SetupError> {
        info!("Acquiring auth token from {}/login", self.client.base_url());
        match self.client.login(&self.credentials).await {
            Ok(session) => {
                info!("Login succeeded, starting load");
                Ok(session)
            }
            Err(e) => {
                error!("Login failed for {}: {}", self.credentials.email, e);
                Err(e)
            }
        }
    }

    async fn iteration(&self, session: &Session, ctx: &VuContext) {
        let unique_id = ctx.unique_id();

        self.company_list_crud(session, ctx, &unique_id).await;
        ctx.sleep(2.0).await;

        self.internship_crud(session, ctx, &unique_id).await;
        ctx.sleep(2.0).await;

        self.post_comment_like(session, ctx, &unique_id).await;
        ctx.sleep(3.0).await;
    }
}
