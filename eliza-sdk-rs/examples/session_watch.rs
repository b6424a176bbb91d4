use eliza_sdk_rs::{
    MessagingClient, RelayEvent, SocketConfig, SocketManager,
    models::CENTRAL_SERVER_ID,
    session::{build_session, is_session_channel, sort_by_last_activity},
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv::dotenv().ok();

    let server_url =
        std::env::var("ELIZA_SERVER_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let (Ok(user_id), Ok(agent_id)) = (std::env::var("USER_ID"), std::env::var("ELIZA_AGENT_ID"))
    else {
        println!("USER_ID and ELIZA_AGENT_ID must be set to run this example.");
        return Ok(());
    };

    // 1. List the user's sessions with the agent
    let client = MessagingClient::new(&server_url);
    let channels = client.list_server_channels(CENTRAL_SERVER_ID).await?;
    let mut sessions = Vec::new();
    for channel in channels
        .iter()
        .filter(|c| is_session_channel(c, &user_id, &agent_id))
    {
        let messages = client.channel_messages(&channel.id, 50).await.ok();
        sessions.push(build_session(channel, messages, &user_id, &agent_id));
    }
    sort_by_last_activity(&mut sessions);

    println!("{} session(s):", sessions.len());
    for session in &sessions {
        println!("  {} [{}] {}", session.channel_id, session.message_count, session.title);
    }

    let Some(latest) = sessions.first() else {
        return Ok(());
    };

    // 2. Tail the most recent one
    let socket = Arc::new(SocketManager::new(user_id.clone(), None));
    let mut events = socket.subscribe();
    socket.initialize(SocketConfig::new(&server_url)).await;
    socket.set_active_session_channel_id(&latest.channel_id).await;
    socket.join_channel(&latest.channel_id, None).await?;

    println!("\nWatching {} (Ctrl-C to stop)...", latest.channel_id);
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(RelayEvent::MessageBroadcast(msg)) => println!("{}: {}", msg.sender_name, msg.text),
                Ok(other) => println!("<{}>", other.name()),
                Err(_) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    socket.disconnect().await;
    Ok(())
}
