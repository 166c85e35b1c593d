use crc16::{State, ARC};

/// Running CRC-16/ARC over a telegram as it comes in
pub struct Crc16 {
    state: State<ARC>,
}

impl Crc16 {
    pub fn new() -> Self {
        return Crc16 { state: State::<ARC>::new() };
    }

    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    pub fn value(&self) -> u16 {
        return self.state.get();
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

pub fn checksum(data: &[u8]) -> u16 {
    return State::<ARC>::calculate(data);
}

/// Four upper case hex digits, as the meters send it after the `!`
pub fn format_crc(crc: u16) -> String {
    return format!("{:04X}", crc);
}
