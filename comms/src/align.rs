// Primitive number types that are 1 byte aligned.
pub trait Align1: bytemuck::Pod {}

impl Align1 for u8 {}
impl Align1 for u32 {}
impl Align1 for u64 {}
impl Align1 for f32 {}
impl Align1 for f64 {}

// Primitive number types that are at least 4 bytes aligned, receive buffers made of
// these can be reinterpreted as `f32` slices after a 4 byte aligned header.
pub trait Align4: Align1 {}

impl Align4 for u32 {}
impl Align4 for u64 {}
impl Align4 for f32 {}
impl Align4 for f64 {}
