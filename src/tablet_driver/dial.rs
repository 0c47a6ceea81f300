/// 滚轮一圈的刻度数, 原始位置为 `1..=DIAL_POSITIONS`
pub const DIAL_POSITIONS: u8 = 13;

/// wacom 驱动接受的 `ABS_WHEEL` 最大值
pub const ABS_WHEEL_MAX: i32 = 71;

pub const WHEEL_STEP: i32 = 1;

/// 上一次非零的滚轮位置, 只在同一个会话内有效
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollState {
    pub last: u8,
}

/// 把滚轮的原始位置转换为相对滚动步长 (-1, 0, +1)
///
/// 位置增大为正方向. 滚轮是一个环, 1 和 13 相邻,
/// 跨过这个边界时按一格处理而不是反向跳 12 格
pub fn step(raw_position: u8, state: &mut ScrollState) -> i32 {
    if raw_position == 0 {
        return 0;
    }

    let previous = state.last;
    state.last = raw_position;

    if raw_position == previous {
        return 0;
    }
    let forward = match (previous, raw_position) {
        (DIAL_POSITIONS, 1) => true,
        (1, DIAL_POSITIONS) => false,
        _ => raw_position > previous,
    };
    if forward { WHEEL_STEP } else { -WHEEL_STEP }
}

/// 把原始位置映射到 `[0, ABS_WHEEL_MAX]`
///
/// 先调整方向, 让绝对值的零点固定在滚轮的同一侧
pub fn absolute(raw_position: u8) -> i32 {
    if raw_position == 0 {
        return 0;
    }
    let raw = raw_position as i32;
    let oriented = if raw > 6 { 19 - raw } else { 7 - raw };
    oriented * ABS_WHEEL_MAX / 12
}
