// What the sequencer asks of the instruments on a given tick.
// The engine owns the voices; the sequencer only ever hands it these.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VoiceCommand {
    Kick,
    Snare,
    Hihat { volume: f32 },

    // absolute note, root already added
    BassNote { note: i32 },

    // let the string ring out with heavier damping
    BassStop,
}
