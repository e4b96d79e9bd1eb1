use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "schooldir",
    version,
    about = "school directory client",
    long_about = "schooldir browses, searches and edits school records kept in a hosted REST table.\n\nExamples:\n  schooldir list --query high --city Austin\n  schooldir add --name \"Lakeside High\" --email office@lakeside.edu --address \"12 Shore Road\" --city Austin --state TX --contact 5125550100\n  schooldir edit 42 --contact 5125550199\n  schooldir delete 42\n  schooldir diagnose\n\nTip: put service_url and anon_key in ~/.schooldir/config.yml (see `schooldir init-config`)."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        long = "no-color",
        visible_alias = "nc",
        global = true,
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'C',
        long = "config",
        visible_alias = "cfg",
        value_name = "FILE",
        global = true,
        help_heading = "Service",
        help = "Path to config file (defaults to ~/.schooldir/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'U',
        long = "service-url",
        visible_alias = "url",
        value_name = "URL",
        global = true,
        help_heading = "Service",
        help = "Base URL of the data service."
    )]
    pub service_url: Option<String>,

    #[arg(
        short = 'K',
        long = "anon-key",
        visible_alias = "key",
        value_name = "KEY",
        global = true,
        help_heading = "Service",
        help = "Public (anon) API key of the data service."
    )]
    pub anon_key: Option<String>,

    #[arg(
        long = "table",
        value_name = "NAME",
        global = true,
        help_heading = "Service",
        help = "Table holding the school records (default: schools)."
    )]
    pub table: Option<String>,

    #[arg(
        long = "timeout",
        visible_alias = "to",
        value_name = "SECONDS",
        global = true,
        help_heading = "Service",
        help = "Request timeout in seconds (default: 30)."
    )]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List schools, optionally filtered.
    #[command(visible_alias = "ls")]
    List(ListArgs),

    /// Print the distinct cities present in the directory.
    Cities,

    /// Add a new school.
    Add(SchoolFields),

    /// Show one school.
    Show {
        #[arg(value_name = "ID")]
        id: String,
        #[command(flatten)]
        render: RenderArgs,
    },

    /// Change fields of one school; unspecified fields keep their value.
    Edit {
        #[arg(value_name = "ID")]
        id: String,
        #[command(flatten)]
        fields: SchoolFields,
    },

    /// Delete one school after confirmation.
    #[command(visible_alias = "rm")]
    Delete {
        #[arg(value_name = "ID")]
        id: String,
        #[arg(short = 'y', long = "yes", help = "Skip the confirmation prompt.")]
        yes: bool,
    },

    /// Interactive session: search, open, edit and delete records.
    Browse,

    /// Check connectivity to the data service.
    #[command(visible_alias = "test")]
    Diagnose {
        #[arg(long = "format", visible_alias = "fmt", value_name = "FORMAT")]
        format: Option<String>,
    },

    /// Write a commented default config file if none exists.
    InitConfig,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RenderArgs {
    #[arg(
        long = "format",
        visible_alias = "fmt",
        value_name = "FORMAT",
        help = "Output format: text or json."
    )]
    pub format: Option<String>,

    #[arg(
        long = "check-images",
        visible_alias = "ci",
        help = "Probe image URLs and fall back to a placeholder when they do not load."
    )]
    pub check_images: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(
        short = 'q',
        long = "query",
        value_name = "TEXT",
        help = "Case-insensitive search over name, city and state."
    )]
    pub query: Option<String>,

    #[arg(
        short = 'c',
        long = "city",
        value_name = "CITY",
        help = "Only schools in exactly this city."
    )]
    pub city: Option<String>,

    #[command(flatten)]
    pub render: RenderArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SchoolFields {
    #[arg(long = "name", value_name = "TEXT")]
    pub name: Option<String>,

    #[arg(long = "email", visible_alias = "email-id", value_name = "EMAIL")]
    pub email_id: Option<String>,

    #[arg(long = "address", value_name = "TEXT")]
    pub address: Option<String>,

    #[arg(long = "city", value_name = "CITY")]
    pub city: Option<String>,

    #[arg(long = "state", value_name = "STATE")]
    pub state: Option<String>,

    #[arg(long = "contact", value_name = "DIGITS")]
    pub contact: Option<String>,

    #[arg(
        long = "image",
        value_name = "URL",
        help = "Image URL; pass an empty string to remove it."
    )]
    pub image: Option<String>,
}

impl SchoolFields {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email_id.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.contact.is_none()
            && self.image.is_none()
    }

    /// Overwrites the draft fields that were given on the command line.
    pub fn apply_to(&self, draft: &mut crate::model::SchoolDraft) {
        use crate::model::Field;
        let given = [
            (Field::Name, &self.name),
            (Field::EmailId, &self.email_id),
            (Field::Address, &self.address),
            (Field::City, &self.city),
            (Field::State, &self.state),
            (Field::Contact, &self.contact),
            (Field::Image, &self.image),
        ];
        for (field, value) in given {
            if let Some(value) = value {
                draft.set(field, value.clone());
            }
        }
    }
}
