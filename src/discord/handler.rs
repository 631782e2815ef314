//! Gateway event handler: registers slash commands and turns interactions
//! into desk events.
//!
//! Every interaction is deferred first so Discord's three-second window never
//! expires while the desk talks to the API, then the deferred response is
//! edited with the desk's reply.

use std::sync::Arc;

use serenity::all::{
    ChannelType, Command, CommandDataOptionValue, CommandInteraction, CommandOptionType,
    ComponentInteraction, Context, CreateCommand, CreateCommandOption, EditInteractionResponse,
    EventHandler, GuildId, Interaction, Member, Permissions, Ready,
};
use serenity::async_trait;
use tracing::{error, info, warn};

use crate::core::models::{EventKind, InboundEvent, PanelRequest, Reply};
use crate::desk::TicketDesk;
use crate::desk::replies::{CLAIM_BUTTON, CLOSE_BUTTON};
use crate::panel::OPEN_TICKET_BUTTON;
use crate::platform::Actor;

const GUILD_ONLY: &str = "❌ Tickets only work inside a server.";

pub struct Handler {
    desk: Arc<TicketDesk>,
    /// Register commands on this guild only; global otherwise.
    command_guild: Option<GuildId>,
}

impl Handler {
    #[must_use]
    pub fn new(desk: Arc<TicketDesk>, command_guild: Option<GuildId>) -> Self {
        Self {
            desk,
            command_guild,
        }
    }

    async fn handle_command(&self, ctx: &Context, command: CommandInteraction) {
        if let Err(e) = command.defer_ephemeral(&ctx.http).await {
            warn!(command = %command.data.name, "Failed to defer command: {}", e);
            return;
        }

        let reply = match command_event(&command) {
            Some(event) => self.desk.handle(event).await,
            None if command.guild_id.is_none() => Reply::ephemeral(GUILD_ONLY),
            None => Reply::ephemeral("❌ Unknown command."),
        };

        if let Err(e) = command
            .edit_response(&ctx.http, EditInteractionResponse::new().content(reply.content))
            .await
        {
            error!(command = %command.data.name, "Failed to send command reply: {}", e);
        }
    }

    async fn handle_component(&self, ctx: &Context, component: ComponentInteraction) {
        if let Err(e) = component.defer_ephemeral(&ctx.http).await {
            warn!(custom_id = %component.data.custom_id, "Failed to defer button: {}", e);
            return;
        }

        let reply = match component_event(&component) {
            Some(event) => self.desk.handle(event).await,
            None if component.guild_id.is_none() => Reply::ephemeral(GUILD_ONLY),
            None => Reply::ephemeral("❌ Unknown button."),
        };

        if let Err(e) = component
            .edit_response(&ctx.http, EditInteractionResponse::new().content(reply.content))
            .await
        {
            error!(custom_id = %component.data.custom_id, "Failed to send button reply: {}", e);
        }
    }
}

fn actor(member: &Member) -> Actor {
    let permissions = member.permissions.unwrap_or_else(Permissions::empty);
    Actor {
        id: member.user.id.to_string(),
        name: member.user.name.clone(),
        role_ids: member.roles.iter().map(ToString::to_string).collect(),
        administrator: permissions.administrator(),
        manage_messages: permissions.manage_messages(),
    }
}

fn command_event(command: &CommandInteraction) -> Option<InboundEvent> {
    let guild_id = command.guild_id?;
    let member = command.member.as_deref()?;
    let channel_id = command.channel_id.to_string();

    let option = |name: &str| {
        command
            .data
            .options
            .iter()
            .find(|o| o.name == name)
            .map(|o| &o.value)
    };

    let kind = match command.data.name.as_str() {
        "panel" => EventKind::PanelSetup {
            channel_id,
            request: PanelRequest {
                support_role_id: match option("role") {
                    Some(CommandDataOptionValue::Role(role)) => Some(role.to_string()),
                    _ => None,
                },
                category_id: match option("category") {
                    Some(CommandDataOptionValue::Channel(channel)) => Some(channel.to_string()),
                    _ => None,
                },
                title: match option("title") {
                    Some(CommandDataOptionValue::String(title)) => Some(title.clone()),
                    _ => None,
                },
                description: match option("description") {
                    Some(CommandDataOptionValue::String(text)) => Some(text.clone()),
                    _ => None,
                },
            },
        },
        "add" => match option("user") {
            Some(CommandDataOptionValue::User(user)) => EventKind::AddMember {
                channel_id,
                target_user_id: user.to_string(),
            },
            _ => return None,
        },
        "claim" => EventKind::ClaimTicket { channel_id },
        "close" => EventKind::CloseTicket { channel_id },
        _ => return None,
    };

    Some(InboundEvent {
        id: command.id.to_string(),
        guild_id: guild_id.to_string(),
        actor: actor(member),
        kind,
    })
}

fn component_event(component: &ComponentInteraction) -> Option<InboundEvent> {
    let guild_id = component.guild_id?;
    let member = component.member.as_ref()?;
    let channel_id = component.channel_id.to_string();

    let kind = match component.data.custom_id.as_str() {
        OPEN_TICKET_BUTTON => EventKind::OpenTicket {
            panel_footer: component
                .message
                .embeds
                .first()
                .and_then(|e| e.footer.as_ref())
                .map(|f| f.text.clone()),
        },
        CLAIM_BUTTON => EventKind::ClaimTicket { channel_id },
        CLOSE_BUTTON => EventKind::CloseTicket { channel_id },
        _ => return None,
    };

    Some(InboundEvent {
        id: component.id.to_string(),
        guild_id: guild_id.to_string(),
        actor: actor(member),
        kind,
    })
}

fn commands() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("panel")
            .description("Post or refresh the ticket panel in this channel")
            .add_option(CreateCommandOption::new(
                CommandOptionType::Role,
                "role",
                "Support role that can see new tickets",
            ))
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Channel,
                    "category",
                    "Category new tickets are created in",
                )
                .channel_types(vec![ChannelType::Category]),
            )
            .add_option(CreateCommandOption::new(
                CommandOptionType::String,
                "title",
                "Panel title",
            ))
            .add_option(CreateCommandOption::new(
                CommandOptionType::String,
                "description",
                "Panel text",
            )),
        CreateCommand::new("add")
            .description("Add a member to this ticket")
            .add_option(
                CreateCommandOption::new(CommandOptionType::User, "user", "Member to add")
                    .required(true),
            ),
        CreateCommand::new("claim").description("Claim this ticket"),
        CreateCommand::new("close").description("Close this ticket and send the transcript"),
    ]
}

#[async_trait]
impl EventHandler for Handler {
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => self.handle_command(&ctx, command).await,
            Interaction::Component(component) => self.handle_component(&ctx, component).await,
            _ => {}
        }
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);

        let result = match self.command_guild {
            Some(guild_id) => guild_id.set_commands(&ctx.http, commands()).await,
            None => Command::set_global_commands(&ctx.http, commands()).await,
        };
        match result {
            Ok(registered) => info!(count = registered.len(), "Slash commands registered"),
            Err(e) => error!("Failed to register slash commands: {}", e),
        }
    }
}
