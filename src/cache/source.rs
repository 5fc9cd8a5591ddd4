use async_trait::async_trait;

use crate::api::{ApiClient, ApiError, Recommendation};

/// Where the recommendation cache gets fresh data from
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    /// Fetch up to `count` recommendations for `user_id`
    async fn fetch_recommendations(
        &self,
        user_id: &str,
        count: u32,
    ) -> Result<Vec<Recommendation>, ApiError>;
}

#[async_trait]
impl RecommendationSource for ApiClient {
    async fn fetch_recommendations(
        &self,
        user_id: &str,
        count: u32,
    ) -> Result<Vec<Recommendation>, ApiError> {
        ApiClient::fetch_recommendations(self, user_id, count).await
    }
}
