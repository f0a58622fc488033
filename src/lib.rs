#[macro_use]
pub mod logging;

pub mod commands;
pub mod controller;
pub mod io;
pub mod settings;

pub use controller::Controller;
pub use io::serial::{LinkPort, SerialLink, SerialLinkConfig};
pub use io::{
    build_frame, parse_hex, CommandError, EventReceiver, Frame, FrameError, HexParseError,
    LinkError, LinkEvent, PortError, SendTarget,
};
pub use settings::LinkSettings;

/// Build a controller over a real serial port configured from `settings`.
pub fn open_controller(settings: &LinkSettings) -> (Controller<SerialLink>, EventReceiver) {
    let link = SerialLink::new(SerialLinkConfig::from(settings));
    Controller::new(link, settings.max_buffer_len)
}
