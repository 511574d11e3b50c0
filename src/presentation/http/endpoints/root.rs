use std::sync::Arc;

use poem_openapi::Tags;

use crate::application::usecases::list_sent_messages::ListSentMessagesUseCase;

#[derive(Clone)]
pub struct ApiState {
    pub list_sent_messages_usecase: Arc<ListSentMessagesUseCase>,
}

/// Enum of API sections (tags)
#[derive(Tags)]
pub enum EndpointsTags {
    Health,
    Messages,
}
