//! Request handlers used to exercise the simulated network.

mod capture;
pub use capture::Capture;

mod echo;
pub use echo::Echo;

mod ping_pong;
pub use ping_pong::PingPong;
