//! Hints for the branch predictor, on stable Rust. Calling a `#[cold]` function on one side of a
//! branch makes the compiler lay out the other side as the fall-through path.

#[cold]
#[inline(never)]
pub fn cold() {}

#[inline(always)]
pub fn likely(b: bool) -> bool {
    if !b {
        cold()
    }
    b
}

#[inline(always)]
pub fn unlikely(b: bool) -> bool {
    if b {
        cold()
    }
    b
}
