use crate::{
    domain::models::{Message, iso8601},
    presentation::http::responses::SentMessageDto,
};

pub fn map_sent_message(message: &Message) -> SentMessageDto {
    SentMessageDto {
        id: message.id,
        phone_number: message.phone_number.clone(),
        content: message.content.clone(),
        message_id: message.external_id().map(str::to_string),
        sent_at: message.sent_at().map(iso8601),
        created_at: iso8601(message.created_at),
    }
}
