use ndarray::Array3;
use proptest::prelude::*;
use volume_annotate::{RoiSpec, VolumeError, extract_roi};

fn ramp(dim: (usize, usize, usize)) -> Array3<i32> {
    Array3::from_shape_fn(dim, |(z, y, x)| (z * 10_000 + y * 100 + x) as i32)
}

#[derive(Debug, Clone)]
struct Case {
    dim: (usize, usize, usize),
    x: (usize, usize),
    y: (usize, usize),
    z: Option<(usize, usize)>,
    jitter: (f64, f64),
}

fn case() -> impl Strategy<Value = Case> {
    (1usize..6, 1usize..24, 1usize..24)
        .prop_flat_map(|(d, h, w)| {
            (
                Just((d, h, w)),
                (0..=w).prop_flat_map(move |x0| (Just(x0), x0..=w)),
                (0..=h).prop_flat_map(move |y0| (Just(y0), y0..=h)),
                proptest::option::of((0..=d).prop_flat_map(move |z0| (Just(z0), z0..=d))),
                (-0.45f64..0.45, -0.45f64..0.45),
            )
        })
        .prop_map(|(dim, x, y, z, jitter)| Case { dim, x, y, z, jitter })
}

fn roi_for(case: &Case) -> RoiSpec {
    let (ex, ey) = case.jitter;
    let roi = RoiSpec::from_extents(
        case.x.0 as f64 + ex,
        case.y.0 as f64 + ey,
        case.x.1 as f64 + ex,
        case.y.1 as f64 + ey,
    );
    match case.z {
        Some((start, end)) => roi.with_z_range(start as i64, end as i64),
        None => roi,
    }
}

proptest! {
    #[test]
    fn output_shape_is_rounded_spans(case in case()) {
        let volume = ramp(case.dim);
        let out = extract_roi(&volume, &roi_for(&case)).unwrap();
        let z_extent = case.z.map_or(case.dim.0, |(start, end)| end - start);
        prop_assert_eq!(out.dim(), (z_extent, case.y.1 - case.y.0, case.x.1 - case.x.0));
    }

    #[test]
    fn output_starts_at_rounded_origin(case in case()) {
        let volume = ramp(case.dim);
        let out = extract_roi(&volume, &roi_for(&case)).unwrap();
        if !out.is_empty() {
            let z0 = case.z.map_or(0, |(start, _)| start);
            prop_assert_eq!(out[[0, 0, 0]], volume[[z0, case.y.0, case.x.0]]);
        }
    }
}

#[test]
fn extracted_roi_does_not_alias_source() {
    let mut volume = ramp((3, 10, 10));
    let roi = RoiSpec::from_extents(2.0, 2.0, 6.0, 6.0);
    let mut out = extract_roi(&volume, &roi).unwrap();

    out[[0, 0, 0]] = -1;
    assert_eq!(volume[[0, 2, 2]], 202);

    volume[[1, 3, 3]] = -7;
    assert_eq!(out[[1, 1, 1]], 10_303);
}

#[test]
fn unequal_top_and_bottom_spans_fail() {
    let mut roi = RoiSpec::from_extents(0.0, 0.0, 10.0, 4.0);
    roi.corners.insert("bottom_right".into(), vec![12.0, 4.0]);
    let err = extract_roi(&ramp((1, 8, 16)), &roi).unwrap_err();
    assert!(matches!(err, VolumeError::ShapeMismatch(_)));
}

#[test]
fn extraction_works_on_views() {
    let volume = ramp((4, 6, 6));
    let roi = RoiSpec::from_extents(1.0, 1.0, 3.0, 3.0);
    let out = extract_roi(&volume.view(), &roi).unwrap();
    assert_eq!(out.dim(), (4, 2, 2));
}
