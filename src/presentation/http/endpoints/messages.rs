use std::sync::Arc;

use poem::Result as PoemResult;
use poem_openapi::{OpenApi, payload::Json};

use crate::presentation::http::{
    endpoints::root::{ApiState, EndpointsTags},
    mappers::map_sent_message,
    responses::SentMessagesResponseDto,
};

#[derive(Clone)]
pub struct MessagesEndpoints {
    state: Arc<ApiState>,
}

impl MessagesEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl MessagesEndpoints {
    /// List sent messages, most recently sent first
    #[oai(
        path = "/messages",
        method = "get",
        tag = EndpointsTags::Messages,
    )]
    pub async fn list_messages(&self) -> PoemResult<Json<SentMessagesResponseDto>> {
        let messages = self
            .state
            .list_sent_messages_usecase
            .execute()
            .await
            .map_err(internal_error)?;

        let data: Vec<_> = messages.iter().map(map_sent_message).collect();
        Ok(Json(SentMessagesResponseDto {
            success: true,
            count: data.len() as u32,
            data,
        }))
    }
}

fn internal_error(err: anyhow::Error) -> poem::Error {
    tracing::error!(error = %err, "failed to list sent messages");
    poem::Error::from_string(
        err.to_string(),
        poem::http::StatusCode::INTERNAL_SERVER_ERROR,
    )
}
