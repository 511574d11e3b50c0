use poem_openapi::Object;

#[derive(Object)]
pub struct SentMessageDto {
    pub id: i64,
    pub phone_number: String,
    pub content: String,
    pub message_id: Option<String>,
    pub sent_at: Option<String>,
    pub created_at: String,
}

#[derive(Object)]
pub struct SentMessagesResponseDto {
    pub success: bool,
    pub count: u32,
    pub data: Vec<SentMessageDto>,
}
