use tokio::sync::watch;

/// Preferred size of one item handed to the packer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemSize {
    pub width: u32,
    pub height: u32,
}

/// Computed origin of one item after a layout pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
}

/// Left-to-right flow packer for the thumbnail grid.
///
/// Items are placed in insertion order and wrapped to a new row when the
/// next item would overflow the container width. Pure geometry: no I/O and
/// no failure modes. Height changes are published on a watch channel so the
/// host layout can renegotiate without polling.
pub struct FlowPacker {
    items: Vec<ItemSize>,
    placements: Vec<Placement>,
    h_spacing: u32,
    v_spacing: u32,
    height_tx: watch::Sender<u32>,
}

impl FlowPacker {
    pub fn new(h_spacing: u32, v_spacing: u32) -> Self {
        let (height_tx, _) = watch::channel(0);
        FlowPacker {
            items: Vec::new(),
            placements: Vec::new(),
            h_spacing,
            v_spacing,
            height_tx,
        }
    }

    pub fn push_item(&mut self, width: u32, height: u32) {
        self.items.push(ItemSize { width, height });
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.placements.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Observe the most recently computed total height
    pub fn subscribe_height(&self) -> watch::Receiver<u32> {
        self.height_tx.subscribe()
    }

    /// Place all items for the given container width and return the total
    /// height consumed. Placements are readable via [`placements`](Self::placements).
    pub fn layout(&mut self, container_width: u32) -> u32 {
        let mut placements = Vec::with_capacity(self.items.len());
        let height = pack(
            &self.items,
            container_width,
            self.h_spacing,
            self.v_spacing,
            Some(&mut placements),
        );
        self.placements = placements;
        self.publish(height);
        height
    }

    /// Measurement-only pass: computes the height the items would take at
    /// `container_width` without touching stored placements. Used for host
    /// layout negotiation (height-for-width queries).
    pub fn height_for_width(&self, container_width: u32) -> u32 {
        let height = pack(
            &self.items,
            container_width,
            self.h_spacing,
            self.v_spacing,
            None,
        );
        self.publish(height);
        height
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    fn publish(&self, height: u32) {
        self.height_tx.send_if_modified(|current| {
            if *current != height {
                *current = height;
                true
            } else {
                false
            }
        });
    }
}

fn pack(
    items: &[ItemSize],
    container_width: u32,
    h_spacing: u32,
    v_spacing: u32,
    mut placements: Option<&mut Vec<Placement>>,
) -> u32 {
    let mut x = 0u32;
    let mut y = 0u32;
    let mut row_height = 0u32;
    let mut row_count = 0usize;

    for item in items {
        // Never wrap against an empty row: an item wider than the container
        // is placed anyway and overflows.
        if row_count > 0 && x + item.width > container_width {
            x = 0;
            y += row_height + v_spacing;
            row_height = 0;
            row_count = 0;
        }

        if let Some(out) = placements.as_deref_mut() {
            out.push(Placement { x, y });
        }

        x += item.width + h_spacing;
        row_height = row_height.max(item.height);
        row_count += 1;
    }

    if items.is_empty() {
        0
    } else {
        y + row_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packer_with(items: &[(u32, u32)]) -> FlowPacker {
        let mut packer = FlowPacker::new(10, 10);
        for &(w, h) in items {
            packer.push_item(w, h);
        }
        packer
    }

    #[test]
    fn test_single_row_when_space_allows() {
        let mut packer = packer_with(&[(100, 50), (100, 50), (100, 50)]);
        let height = packer.layout(400);
        assert_eq!(height, 50);
        assert_eq!(
            packer.placements(),
            &[
                Placement { x: 0, y: 0 },
                Placement { x: 110, y: 0 },
                Placement { x: 220, y: 0 },
            ]
        );
    }

    #[test]
    fn test_wraps_on_overflow() {
        let mut packer = packer_with(&[(100, 50), (100, 50), (100, 50)]);
        let height = packer.layout(250);
        // Two rows: third item would end at x=220..320 > 250.
        assert_eq!(packer.placements()[2], Placement { x: 0, y: 60 });
        assert_eq!(height, 110);
    }

    #[test]
    fn test_oversized_item_never_wraps_on_empty_row() {
        let mut packer = packer_with(&[(500, 40), (500, 40)]);
        let height = packer.layout(300);
        assert_eq!(packer.placements()[0], Placement { x: 0, y: 0 });
        assert_eq!(packer.placements()[1], Placement { x: 0, y: 50 });
        assert_eq!(height, 90);
    }

    #[test]
    fn test_no_horizontal_overlap_within_rows() {
        let mut packer = packer_with(&[(60, 30), (80, 40), (50, 20), (70, 35), (90, 25)]);
        packer.layout(200);

        let placements = packer.placements().to_vec();
        let sizes: Vec<ItemSize> = (0..placements.len())
            .map(|i| packer.items[i])
            .collect();
        for i in 0..placements.len() {
            for j in (i + 1)..placements.len() {
                if placements[i].y == placements[j].y {
                    let (a, b) = if placements[i].x <= placements[j].x {
                        (i, j)
                    } else {
                        (j, i)
                    };
                    assert!(
                        placements[a].x + sizes[a].width <= placements[b].x,
                        "items {} and {} overlap",
                        i,
                        j
                    );
                }
            }
        }
    }

    #[test]
    fn test_total_height_matches_last_row() {
        let mut packer = packer_with(&[(100, 30), (100, 60), (100, 45)]);
        let height = packer.layout(250);
        let last_row_y = packer.placements().last().unwrap().y;
        let last_row_height = packer
            .placements()
            .iter()
            .zip(&packer.items)
            .filter(|(p, _)| p.y == last_row_y)
            .map(|(_, s)| s.height)
            .max()
            .unwrap();
        assert_eq!(height, last_row_y + last_row_height);
    }

    #[test]
    fn test_measurement_mode_does_not_mutate_placements() {
        let mut packer = packer_with(&[(100, 50), (100, 50)]);
        packer.layout(400);
        let before = packer.placements().to_vec();

        let measured = packer.height_for_width(150);
        assert_eq!(measured, 110);
        assert_eq!(packer.placements(), &before[..]);
    }

    #[test]
    fn test_height_observer_sees_changes() {
        let mut packer = packer_with(&[(100, 50), (100, 50)]);
        let rx = packer.subscribe_height();
        assert_eq!(*rx.borrow(), 0);

        packer.layout(400);
        assert_eq!(*rx.borrow(), 50);

        packer.layout(150);
        assert_eq!(*rx.borrow(), 110);
    }

    #[test]
    fn test_empty_packer_has_zero_height() {
        let mut packer = FlowPacker::new(10, 10);
        assert_eq!(packer.layout(400), 0);
        assert_eq!(packer.height_for_width(400), 0);
    }
}
