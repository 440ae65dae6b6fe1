/// One filtered chunk handed from the audio pipeline to the actuator
/// scheduler: parallel LPF/HPF mono traces over the same span of samples.
#[derive(Debug, Clone)]
pub struct FilteredFrame {
    pub lpf: Vec<i16>,
    pub hpf: Vec<i16>,
    /// Sample rate the frame was produced at; carried alongside the frame so
    /// the scheduler never has to assume it matches its own configuration.
    pub sample_rate: u32,
}

impl FilteredFrame {
    pub fn len(&self) -> usize {
        self.lpf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lpf.is_empty()
    }
}
