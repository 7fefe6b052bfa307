/// # Constants with reserved meanings in netkernel

/// In a network input shape, the `0th` dimension is the batch
pub const BATCH_DIM: usize = 0;

/// In a network input shape, the `1st` dimension is the channel
pub const CHANNEL_DIM: usize = 1;

/// In a network input shape, the `2nd` dimension is the height
pub const HEIGHT_DIM: usize = 2;

/// In a network input shape, the `3rd` dimension is the width
pub const WIDTH_DIM: usize = 3;

/// Every network tensor holds `f32` elements
pub const ELEMENT_SIZE: usize = std::mem::size_of::<f32>();
