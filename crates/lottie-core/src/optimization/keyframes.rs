use crate::animatable::KeyFrame;

/// Returns an equivalent keyframe sequence with redundant keyframes removed.
///
/// A keyframe is redundant when it has the same value as the keyframe before it
/// and the keyframe after it, and neither segment can move between equal values
/// (non-linear bezier easing or a curved motion path). The keyframe that ends a
/// removed run gets hold easing. A trailing keyframe equal to its predecessor is
/// dropped under the same condition.
pub fn remove_redundant_keyframes<T: Clone + PartialEq>(
    keyframes: &[KeyFrame<T>],
) -> Vec<KeyFrame<T>> {
    if keyframes.len() <= 1 {
        return keyframes.to_vec();
    }

    let last = keyframes.len() - 1;
    let mut out: Vec<KeyFrame<T>> = Vec::with_capacity(keyframes.len());
    out.push(keyframes[0].clone());

    let mut i = 1;
    while i <= last {
        let mut current = &keyframes[i];
        let mut redundant = 0;

        let previous = &out[out.len() - 1];
        if i < last && previous.value == current.value {
            loop {
                let next = &keyframes[i + 1];
                if next.value != previous.value {
                    break;
                }
                if current.has_visible_motion() || next.has_visible_motion() {
                    break;
                }

                redundant += 1;
                current = next;
                i += 1;
                if i == last {
                    break;
                }
            }
        }

        let kept = if redundant > 0 {
            current.clone().with_hold_easing()
        } else {
            current.clone()
        };
        out.push(kept);
        i += 1;
    }

    let n = out.len();
    if n >= 2 && out[n - 1].value == out[n - 2].value && !out[n - 1].has_visible_motion() {
        out.pop();
    }

    out
}

/// Returns the keyframes that affect rendering between `start` and `end`: the
/// last keyframe at or before `start`, the first keyframe at or after `end`,
/// and everything in between.
pub fn trim_keyframes<T: Clone + PartialEq>(
    keyframes: &[KeyFrame<T>],
    start: f32,
    end: f32,
) -> Vec<KeyFrame<T>> {
    if keyframes.is_empty() || end < start {
        return keyframes.to_vec();
    }

    let mut in_frame = 0;
    for (i, kf) in keyframes.iter().enumerate() {
        if kf.frame > start {
            break;
        }
        in_frame = i;
    }

    let mut out_frame = keyframes.len() - 1;
    for (i, kf) in keyframes.iter().enumerate().rev() {
        if kf.frame < end {
            break;
        }
        out_frame = i;
    }

    if out_frame < in_frame {
        return keyframes[in_frame..=in_frame].to_vec();
    }

    let trimmed = &keyframes[in_frame..=out_frame];
    if trimmed.windows(2).any(|w| w[0].frame == w[1].frame) {
        remove_redundant_keyframes(trimmed)
    } else {
        trimmed.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animatable::{value_at, Easing};

    fn frames(kfs: &[KeyFrame<f32>]) -> Vec<f32> {
        kfs.iter().map(|kf| kf.frame).collect()
    }

    #[test]
    fn test_run_of_equal_values_collapses_to_hold() {
        let kfs = vec![
            KeyFrame::linear(0.0, 1.0f32),
            KeyFrame::linear(10.0, 1.0),
            KeyFrame::linear(20.0, 1.0),
            KeyFrame::linear(30.0, 1.0),
            KeyFrame::linear(40.0, 5.0),
        ];

        let reduced = remove_redundant_keyframes(&kfs);
        assert_eq!(frames(&reduced), vec![0.0, 30.0, 40.0]);
        assert_eq!(reduced[1].easing, Easing::Hold);
        assert_eq!(reduced[2].easing, Easing::Linear);

        for t in [0.0, 5.0, 25.0, 30.0, 35.0, 40.0, 50.0] {
            assert_eq!(value_at(&reduced, t), value_at(&kfs, t), "t = {}", t);
        }
    }

    #[test]
    fn test_non_linear_easing_blocks_removal() {
        let kfs = vec![
            KeyFrame::linear(0.0, 1.0f32),
            KeyFrame::new(10.0, 1.0, Easing::cubic(0.4, 0.0, 0.2, 1.0)),
            KeyFrame::linear(20.0, 1.0),
            KeyFrame::linear(30.0, 2.0),
        ];

        let reduced = remove_redundant_keyframes(&kfs);
        assert_eq!(frames(&reduced), vec![0.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_linear_bezier_does_not_block_removal() {
        let kfs = vec![
            KeyFrame::linear(0.0, 1.0f32),
            KeyFrame::new(10.0, 1.0, Easing::cubic(0.3, 0.3, 0.7, 0.7)),
            KeyFrame::linear(20.0, 1.0),
            KeyFrame::linear(30.0, 2.0),
        ];

        assert_eq!(frames(&remove_redundant_keyframes(&kfs)), vec![0.0, 20.0, 30.0]);
    }

    #[test]
    fn test_trailing_duplicate_dropped() {
        let kfs = vec![
            KeyFrame::linear(0.0, 0.0f32),
            KeyFrame::linear(10.0, 4.0),
            KeyFrame::linear(20.0, 4.0),
        ];
        assert_eq!(frames(&remove_redundant_keyframes(&kfs)), vec![0.0, 10.0]);

        let eased = vec![
            KeyFrame::linear(0.0, 0.0f32),
            KeyFrame::linear(10.0, 4.0),
            KeyFrame::new(20.0, 4.0, Easing::cubic(0.5, 0.0, 0.5, 1.0)),
        ];
        assert_eq!(remove_redundant_keyframes(&eased).len(), 3);
    }

    #[test]
    fn test_reduction_is_idempotent() {
        let kfs = vec![
            KeyFrame::linear(0.0, 3.0f32),
            KeyFrame::linear(5.0, 3.0),
            KeyFrame::linear(10.0, 3.0),
            KeyFrame::linear(15.0, 7.0),
            KeyFrame::linear(20.0, 7.0),
            KeyFrame::linear(25.0, 7.0),
            KeyFrame::linear(30.0, 1.0),
        ];

        let once = remove_redundant_keyframes(&kfs);
        let twice = remove_redundant_keyframes(&once);
        assert_eq!(once, twice);

        let mut t = 0.0;
        while t <= 32.0 {
            assert_eq!(value_at(&once, t), value_at(&kfs, t), "t = {}", t);
            t += 0.5;
        }
    }

    #[test]
    fn test_trim_keeps_bracketing_keyframes() {
        let kfs: Vec<_> = (0..6)
            .map(|i| KeyFrame::linear(i as f32 * 10.0, i as f32))
            .collect();

        let trimmed = trim_keyframes(&kfs, 15.0, 32.0);
        assert_eq!(frames(&trimmed), vec![10.0, 20.0, 30.0, 40.0]);

        let exact = trim_keyframes(&kfs, 20.0, 30.0);
        assert_eq!(frames(&exact), vec![20.0, 30.0]);
    }

    #[test]
    fn test_trim_outside_range_keeps_one_end() {
        let kfs = vec![KeyFrame::linear(0.0, 1.0f32), KeyFrame::linear(10.0, 2.0)];
        assert_eq!(frames(&trim_keyframes(&kfs, 20.0, 30.0)), vec![10.0]);
        assert_eq!(frames(&trim_keyframes(&kfs, -20.0, -10.0)), vec![0.0]);
    }

    #[test]
    fn test_trim_keeps_values_around_zero_length_segments() {
        let kfs = vec![
            KeyFrame::linear(0.0, 1.0f32),
            KeyFrame::linear(10.0, 2.0),
            KeyFrame::hold(10.0, 3.0),
            KeyFrame::linear(20.0, 4.0),
        ];

        let trimmed = trim_keyframes(&kfs, 0.0, 20.0);
        assert_eq!(frames(&trimmed), vec![0.0, 10.0, 10.0, 20.0]);
        for step in 0..=40 {
            let t = step as f32 * 0.5;
            assert_eq!(value_at(&trimmed, t), value_at(&kfs, t), "t = {}", t);
        }
    }

    #[test]
    fn test_trim_reduces_runs_next_to_zero_length_segments() {
        let kfs = vec![
            KeyFrame::linear(0.0, 5.0f32),
            KeyFrame::linear(4.0, 5.0),
            KeyFrame::linear(8.0, 5.0),
            KeyFrame::hold(8.0, 6.0),
            KeyFrame::linear(12.0, 9.0),
            KeyFrame::linear(30.0, 0.0),
        ];

        let trimmed = trim_keyframes(&kfs, 2.0, 12.0);
        assert_eq!(frames(&trimmed), vec![0.0, 8.0, 8.0, 12.0]);
        for step in 4..=24 {
            let t = step as f32 * 0.5;
            assert_eq!(value_at(&trimmed, t), value_at(&kfs, t), "t = {}", t);
        }
    }
}
