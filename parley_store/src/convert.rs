use parley_core::{Agent, ChatKind, ChatRecord, Direction, MessageRecord, Role};
use parley_entities::{agents, chat_messages, messages, roles};

pub fn agent_from_model(m: agents::Model) -> Agent {
    Agent {
        id: m.id,
        name: m.name,
        role_id: m.role_id,
        model_type: m.model_type,
        model_name: m.model_name,
        description: m.description,
    }
}

pub fn role_from_model(m: roles::Model) -> Role {
    Role {
        id: m.id,
        name: m.name,
        description: m.description,
        system_memory: m.system_memory,
    }
}

pub fn message_from_model(m: messages::Model) -> MessageRecord {
    let direction = m.direction.parse::<Direction>().unwrap_or_default();

    MessageRecord {
        id: m.id,
        sender_agent_id: m.sender_agent_id,
        receiver_agent_id: m.receiver_agent_id,
        session_id: m.session_id,
        room_id: m.room_id,
        content: m.content,
        model_type: m.model_type,
        model_name: m.model_name,
        role_id: m.role_id,
        direction,
        created_at: m.created_at,
        round_id: m.round_id,
        is_autonomous: m.is_autonomous,
        metadata: m.metadata,
    }
}

pub fn chat_from_model(m: chat_messages::Model) -> Option<ChatRecord> {
    let kind = m.kind.parse::<ChatKind>().ok()?;

    Some(ChatRecord {
        id: m.id,
        kind,
        from_user_id: m.from_user_id,
        to_user_id: m.to_user_id,
        room_id: m.room_id,
        content: m.content,
        created_at: m.created_at,
    })
}
